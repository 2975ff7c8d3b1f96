//! Frame decoding.
//!
//! [`MessageDecoder::decode`] turns one raw frame into a typed [`RawEvent`]
//! plus, for qualifying commits, a [`ProjectedPost`]. Identity frames update
//! the [`HandleCache`] as a side effect so later posts from the same account
//! carry the handle. Malformed frames come back as [`StreamError::Parse`]
//! with the payload attached; nothing here panics on bad input.

use std::sync::Arc;

use skystream_core::{ProjectedPost, RawEvent, Result, StreamError};

use crate::identity::HandleCache;
use crate::projection::project_post;

/// Result of decoding one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFrame {
    /// The typed event.
    pub event: RawEvent,
    /// Post projection for create commits in the post collection.
    pub post: Option<ProjectedPost>,
}

/// Decoder bound to a handle cache.
#[derive(Debug)]
pub struct MessageDecoder {
    cache: Arc<HandleCache>,
    post_collection: String,
}

impl MessageDecoder {
    /// Create a decoder projecting posts from `post_collection`.
    pub fn new(cache: Arc<HandleCache>, post_collection: impl Into<String>) -> Self {
        Self {
            cache,
            post_collection: post_collection.into(),
        }
    }

    /// The cache this decoder reads and writes.
    pub fn cache(&self) -> &Arc<HandleCache> {
        &self.cache
    }

    /// Decode a text frame.
    pub fn decode(&self, frame: &str) -> Result<DecodedFrame> {
        let event: RawEvent =
            serde_json::from_str(frame).map_err(|e| StreamError::parse(e, frame))?;

        let post = match &event {
            RawEvent::Identity(identity) => {
                if let Some(handle) = &identity.identity.handle {
                    let _ = self.cache.insert(identity.did.clone(), handle.clone());
                }
                None
            }
            RawEvent::Account(_) => None,
            RawEvent::Commit(commit) => project_post(commit, &self.post_collection, || {
                self.cache.get(&commit.did)
            }),
        };

        Ok(DecodedFrame { event, post })
    }

    /// Decode a binary frame holding UTF-8 JSON.
    pub fn decode_bytes(&self, frame: &[u8]) -> Result<DecodedFrame> {
        match std::str::from_utf8(frame) {
            Ok(text) => self.decode(text),
            Err(e) => Err(StreamError::parse(e, String::from_utf8_lossy(frame))),
        }
    }
}
