//! Push-style subscriptions keyed by event category.
//!
//! Handlers run synchronously on the connection task, in registration order.
//! Dispatch walks a snapshot of the handler list, so a handler may register or
//! unregister (itself included) without affecting the delivery in progress.
//! A handler that returns `Err` or panics is logged and skipped; the rest still
//! receive the event.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use skystream_core::{
    AccountEvent, CommitEvent, HandlerError, IdentityEvent, ProjectedPost, StreamError,
};
use tracing::{debug, warn};

/// Category a handler subscribes to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Transport opened.
    Connected,
    /// Transport closed.
    Disconnected,
    /// Transport error.
    Error,
    /// Identity frame.
    Identity,
    /// Account frame.
    Account,
    /// Commit frame.
    Commit,
    /// Projected post.
    Post,
    /// Malformed frame.
    ParseError,
    /// Reconnect budget exhausted.
    MaxReconnectReached,
    /// Caller-defined category.
    Custom(String),
}

impl EventCategory {
    /// Wire-style name of the category.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Identity => "identity",
            Self::Account => "account",
            Self::Commit => "commit",
            Self::Post => "post",
            Self::ParseError => "parse_error",
            Self::MaxReconnectReached => "max_reconnect_reached",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for EventCategory {
    fn from(name: &str) -> Self {
        match name {
            "connected" => Self::Connected,
            "disconnected" => Self::Disconnected,
            "error" => Self::Error,
            "identity" => Self::Identity,
            "account" => Self::Account,
            "commit" => Self::Commit,
            "post" => Self::Post,
            "parse_error" => Self::ParseError,
            "max_reconnect_reached" => Self::MaxReconnectReached,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered to handlers.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent {
    /// Transport opened against `url`.
    Connected {
        /// Subscribe URL in use.
        url: String,
    },
    /// Transport closed.
    Disconnected {
        /// Close code, when the peer sent one.
        code: Option<u16>,
        /// Close reason, when the peer sent one.
        reason: Option<String>,
    },
    /// Transport failure. Informational; state follows the close.
    Error(StreamError),
    /// Identity frame.
    Identity(IdentityEvent),
    /// Account frame.
    Account(AccountEvent),
    /// Commit frame.
    Commit(CommitEvent),
    /// Post projected from a create commit.
    Post(ProjectedPost),
    /// A frame that failed to decode ([`StreamError::Parse`]).
    ParseError(StreamError),
    /// Reconnect budget exhausted after `attempts` tries.
    MaxReconnectReached {
        /// Attempts made.
        attempts: u32,
    },
    /// Caller-defined event.
    Custom {
        /// Category name.
        name: String,
        /// Arbitrary payload.
        data: Value,
    },
}

impl FeedEvent {
    /// Category this event is delivered under.
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Connected { .. } => EventCategory::Connected,
            Self::Disconnected { .. } => EventCategory::Disconnected,
            Self::Error(_) => EventCategory::Error,
            Self::Identity(_) => EventCategory::Identity,
            Self::Account(_) => EventCategory::Account,
            Self::Commit(_) => EventCategory::Commit,
            Self::Post(_) => EventCategory::Post,
            Self::ParseError(_) => EventCategory::ParseError,
            Self::MaxReconnectReached { .. } => EventCategory::MaxReconnectReached,
            Self::Custom { name, .. } => EventCategory::from(name.as_str()),
        }
    }
}

/// Opaque token returned by [`SubscriptionHub::on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A registered handler.
pub type Handler = Arc<dyn Fn(&FeedEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Category → ordered handler registry.
pub struct SubscriptionHub {
    handlers: RwLock<HashMap<EventCategory, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `category`.
    pub fn on<F>(&self, category: impl Into<EventCategory>, handler: F) -> SubscriptionId
    where
        F: Fn(&FeedEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let category = category.into();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(%category, id = id.0, "handler registered");
        let handler: Handler = Arc::new(handler);
        self.handlers
            .write()
            .entry(category)
            .or_default()
            .push((id, handler));
        id
    }

    /// Unregister a handler. Returns whether it was registered.
    ///
    /// The category entry is removed once its last handler goes.
    pub fn off(&self, category: &EventCategory, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(category) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            let _ = handlers.remove(category);
        }
        removed
    }

    /// Deliver `event` to every handler of its category.
    ///
    /// Returns how many handlers completed without error.
    pub fn emit(&self, event: &FeedEvent) -> usize {
        let category = event.category();
        let snapshot: Vec<(SubscriptionId, Handler)> = match self.handlers.read().get(&category) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(error)) => {
                    warn!(%category, id = id.0, %error, "subscription handler failed");
                }
                Err(panic) => {
                    warn!(%category, id = id.0, panic = panic_message(panic.as_ref()), "subscription handler panicked");
                }
            }
        }
        delivered
    }

    /// Number of handlers registered for `category`.
    pub fn handler_count(&self, category: &EventCategory) -> usize {
        self.handlers.read().get(category).map_or(0, Vec::len)
    }

    /// Categories with at least one handler.
    pub fn categories(&self) -> Vec<EventCategory> {
        self.handlers.read().keys().cloned().collect()
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use skystream_core::logging::capture_logs;
    use tracing::Level;

    fn post_event(text: &str) -> FeedEvent {
        FeedEvent::Post(ProjectedPost {
            text: text.into(),
            ..ProjectedPost::default()
        })
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_factory = Arc::clone(&log);
        let factory = move |name: &'static str| -> Handler {
            let log = Arc::clone(&log_for_factory);
            Arc::new(move |_event: &FeedEvent| {
                log.lock().push(name.to_string());
                Ok::<(), HandlerError>(())
            })
        };
        (log, factory)
    }

    #[test]
    fn category_names_round_trip() {
        for name in [
            "connected",
            "disconnected",
            "error",
            "identity",
            "account",
            "commit",
            "post",
            "parse_error",
            "max_reconnect_reached",
            "my_custom",
        ] {
            assert_eq!(EventCategory::from(name).as_str(), name);
        }
        assert_eq!(EventCategory::from("my_custom"), EventCategory::Custom("my_custom".into()));
    }

    #[test]
    fn delivers_in_registration_order() {
        let hub = SubscriptionHub::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        let _ = hub.on(EventCategory::Post, move |e| first(e));
        let _ = hub.on(EventCategory::Post, move |e| second(e));

        assert_eq!(hub.emit(&post_event("x")), 2);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn only_matching_category_receives() {
        let hub = SubscriptionHub::new();
        let (log, make) = recorder();
        let commit = make("commit");
        let _ = hub.on(EventCategory::Commit, move |e| commit(e));
        assert_eq!(hub.emit(&post_event("x")), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn off_removes_handler_and_empty_category() {
        let hub = SubscriptionHub::new();
        let id = hub.on(EventCategory::Post, |_| Ok(()));
        assert_eq!(hub.handler_count(&EventCategory::Post), 1);
        assert!(hub.off(&EventCategory::Post, id));
        assert_eq!(hub.handler_count(&EventCategory::Post), 0);
        assert!(hub.categories().is_empty());
    }

    #[test]
    fn off_unknown_is_noop() {
        let hub = SubscriptionHub::new();
        let id = hub.on(EventCategory::Post, |_| Ok(()));
        assert!(!hub.off(&EventCategory::Commit, id));
        assert!(hub.off(&EventCategory::Post, id));
        assert!(!hub.off(&EventCategory::Post, id));
    }

    #[test]
    fn failing_handler_does_not_block_others() {
        let (logs, _guard) = capture_logs();
        let hub = SubscriptionHub::new();
        let (log, make) = recorder();
        let after = make("after");
        let _ = hub.on(EventCategory::Post, |_| Err("boom".into()));
        let _ = hub.on(EventCategory::Post, move |e| after(e));

        assert_eq!(hub.emit(&post_event("x")), 1);
        assert_eq!(*log.lock(), vec!["after"]);
        assert!(logs.has_event(Level::WARN, "subscription handler failed"));
    }

    #[test]
    fn panicking_handler_is_caught() {
        let (logs, _guard) = capture_logs();
        let hub = SubscriptionHub::new();
        let (log, make) = recorder();
        let after = make("after");
        let _ = hub.on(EventCategory::Post, |_| panic!("handler exploded"));
        let _ = hub.on(EventCategory::Post, move |e| after(e));

        assert_eq!(hub.emit(&post_event("x")), 1);
        assert_eq!(*log.lock(), vec!["after"]);
        let warned = logs
            .events()
            .into_iter()
            .find(|e| e.message == "subscription handler panicked")
            .unwrap();
        assert_eq!(warned.field("panic"), Some("handler exploded"));
    }

    #[test]
    fn handler_can_unregister_itself_mid_dispatch() {
        let hub = Arc::new(SubscriptionHub::new());
        let calls = Arc::new(AtomicU64::new(0));
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let hub_ref = Arc::clone(&hub);
        let id_ref = Arc::clone(&own_id);
        let calls_ref = Arc::clone(&calls);
        let id = hub.on(EventCategory::Post, move |_| {
            let _ = calls_ref.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *id_ref.lock() {
                let _ = hub_ref.off(&EventCategory::Post, id);
            }
            Ok(())
        });
        *own_id.lock() = Some(id);
        let (log, make) = recorder();
        let second = make("second");
        let _ = hub.on(EventCategory::Post, move |e| second(e));

        assert_eq!(hub.emit(&post_event("1")), 2);
        assert_eq!(hub.emit(&post_event("2")), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock(), vec!["second", "second"]);
    }

    #[test]
    fn custom_categories() {
        let hub = SubscriptionHub::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_ref = Arc::clone(&seen);
        let _ = hub.on("trending", move |event| {
            if let FeedEvent::Custom { data, .. } = event {
                *seen_ref.lock() = Some(data.clone());
            }
            Ok(())
        });
        let event = FeedEvent::Custom {
            name: "trending".into(),
            data: serde_json::json!({"tag": "rust"}),
        };
        assert_eq!(event.category(), EventCategory::Custom("trending".into()));
        assert_eq!(hub.emit(&event), 1);
        assert_eq!(seen.lock().as_ref().unwrap()["tag"], "rust");
    }

    #[test]
    fn event_categories() {
        assert_eq!(
            FeedEvent::MaxReconnectReached { attempts: 3 }.category(),
            EventCategory::MaxReconnectReached
        );
        assert_eq!(
            FeedEvent::ParseError(StreamError::parse("bad", "x")).category(),
            EventCategory::ParseError
        );
        assert_eq!(
            FeedEvent::Disconnected { code: None, reason: None }.category().to_string(),
            "disconnected"
        );
    }
}
