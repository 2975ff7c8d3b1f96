//! Pull-style streams derived from the live feed.
//!
//! All three are thin wrappers over a [`PullQueue`]. They end (yield `None`)
//! after `disconnect()` or once the connection is lost for good.

use std::sync::{Arc, Weak};

use futures::Stream;
use skystream_core::{ProjectedPost, RawEvent};

use crate::bridge::{BridgeRegistry, PullQueue};
use crate::hub::{EventCategory, FeedEvent, SubscriptionHub, SubscriptionId};

// ─────────────────────────────────────────────────────────────────────────────
// Posts
// ─────────────────────────────────────────────────────────────────────────────

/// Every projected post, in arrival order.
#[derive(Debug)]
pub struct PostStream {
    queue: Arc<PullQueue<ProjectedPost>>,
}

impl PostStream {
    pub(crate) fn register(bridges: &BridgeRegistry) -> Self {
        Self {
            queue: bridges.posts.register(),
        }
    }

    /// Next post, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<ProjectedPost> {
        self.queue.next().await
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = ProjectedPost> + Send + 'static {
        async_stream::stream! {
            let mut posts = self;
            while let Some(post) = posts.next().await {
                yield post;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Single account
// ─────────────────────────────────────────────────────────────────────────────

/// Commit, identity, and account events for one DID.
///
/// Fed by hub subscriptions that are removed when the stream is dropped.
pub struct AccountStream {
    did: String,
    queue: Arc<PullQueue<RawEvent>>,
    hub: Arc<SubscriptionHub>,
    subscriptions: Vec<(EventCategory, SubscriptionId)>,
}

impl AccountStream {
    pub(crate) fn register(
        bridges: &BridgeRegistry,
        hub: &Arc<SubscriptionHub>,
        did: impl Into<String>,
    ) -> Self {
        let did = did.into();
        let queue = bridges.accounts.register();
        let subscriptions = [
            EventCategory::Commit,
            EventCategory::Identity,
            EventCategory::Account,
        ]
        .into_iter()
        .map(|category| {
            let weak: Weak<PullQueue<RawEvent>> = Arc::downgrade(&queue);
            let wanted = did.clone();
            let id = hub.on(category.clone(), move |event: &FeedEvent| {
                if let Some(raw) = raw_event_for(event, &wanted) {
                    if let Some(queue) = weak.upgrade() {
                        let _ = queue.push(raw);
                    }
                }
                Ok(())
            });
            (category, id)
        })
        .collect();

        Self {
            did,
            queue,
            hub: Arc::clone(hub),
            subscriptions,
        }
    }

    /// DID this stream follows.
    pub fn did(&self) -> &str {
        &self.did
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<RawEvent> {
        self.queue.next().await
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = RawEvent> + Send + 'static {
        async_stream::stream! {
            let mut events = self;
            while let Some(event) = events.next().await {
                yield event;
            }
        }
    }
}

impl std::fmt::Debug for AccountStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStream")
            .field("did", &self.did)
            .field("buffered", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Drop for AccountStream {
    fn drop(&mut self) {
        for (category, id) in self.subscriptions.drain(..) {
            let _ = self.hub.off(&category, id);
        }
    }
}

fn raw_event_for(event: &FeedEvent, did: &str) -> Option<RawEvent> {
    let raw = match event {
        FeedEvent::Commit(commit) => RawEvent::Commit(commit.clone()),
        FeedEvent::Identity(identity) => RawEvent::Identity(identity.clone()),
        FeedEvent::Account(account) => RawEvent::Account(account.clone()),
        _ => return None,
    };
    (raw.did() == did).then_some(raw)
}

// ─────────────────────────────────────────────────────────────────────────────
// Mentions
// ─────────────────────────────────────────────────────────────────────────────

/// Posts that mention, or are authored by, one handle.
#[derive(Debug)]
pub struct MentionStream {
    posts: PostStream,
    handle: String,
}

impl MentionStream {
    pub(crate) fn register(bridges: &BridgeRegistry, handle: &str) -> Self {
        Self {
            posts: PostStream::register(bridges),
            handle: handle.trim_start_matches('@').to_string(),
        }
    }

    /// Handle being matched, without a leading `@`.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Next matching post, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<ProjectedPost> {
        loop {
            let post = self.posts.next().await?;
            if mentions_handle(&post, &self.handle) {
                return Some(post);
            }
        }
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = ProjectedPost> + Send + 'static {
        async_stream::stream! {
            let mut mentions = self;
            while let Some(post) = mentions.next().await {
                yield post;
            }
        }
    }
}

/// Whether `post` text contains `@handle` or the post is authored by `handle`.
///
/// Mentioned DIDs in facets are not resolved to handles.
pub fn mentions_handle(post: &ProjectedPost, handle: &str) -> bool {
    let handle = handle.trim_start_matches('@');
    if handle.is_empty() {
        return false;
    }
    post.author_handle.as_deref() == Some(handle) || post.text.contains(&format!("@{handle}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
