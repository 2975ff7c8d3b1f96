//! Connection controller.
//!
//! One [`FirehoseClient`] owns at most one WebSocket session at a time. The
//! session runs on its own tokio task: it opens the transport, decodes every
//! frame in order, and fans the result out to the hub and the pull bridges.
//!
//! State machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --open--> Connected
//!      ^                          |                    |
//!      +---------- close ---------+-------- close -----+
//! ```
//!
//! After a close the controller may arm a single reconnect timer (capped
//! exponential backoff). Every session carries a generation number; a close
//! or timer belonging to an older generation is ignored, which is how
//! `disconnect()` and a fresh `connect()` win every race against in-flight
//! work.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use skystream_core::{RawEvent, Result, StreamError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bridge::BridgeRegistry;
use crate::config::ClientConfig;
use crate::decoder::{DecodedFrame, MessageDecoder};
use crate::hub::{EventCategory, FeedEvent, SubscriptionHub, SubscriptionId};
use crate::identity::HandleCache;
use crate::streams::{AccountStream, MentionStream, PostStream};
use crate::url::build_subscribe_url;

/// Close code reported when the caller disconnects.
pub const CLIENT_CLOSE_CODE: u16 = 1000;
/// Close reason reported when the caller disconnects.
pub const CLIENT_CLOSE_REASON: &str = "client disconnect";

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no handshake in flight.
    #[default]
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Transport open and pumping frames.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

#[derive(Debug, Default)]
struct Controller {
    state: ConnectionState,
    attempts: u32,
    generation: u64,
    session: Option<CancellationToken>,
    reconnect_timer: Option<JoinHandle<()>>,
    /// Cleared by `disconnect()`; set by an explicit `connect()`.
    armed: bool,
}

/// Who asked for a new session.
#[derive(Clone, Copy, Debug)]
enum Trigger {
    Caller,
    /// Reconnect timer scheduled after the close of this generation.
    Timer(u64),
}

/// What to do after a close has been published.
enum AfterClose {
    Reconnect { delay: Duration, attempt: u32 },
    Exhausted { attempts: u32 },
    Stop,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming client for a Jetstream-style firehose.
///
/// Cheap to clone; clones share the connection, hub, cache, and bridges.
#[derive(Clone)]
pub struct FirehoseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    url: String,
    hub: Arc<SubscriptionHub>,
    decoder: MessageDecoder,
    bridges: BridgeRegistry,
    control: Mutex<Controller>,
}

impl FirehoseClient {
    /// Build a client. Does not connect.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidEndpoint`] when the endpoint is not `ws://` or `wss://`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let url = build_subscribe_url(&config.endpoint, &config.filter)?;
        let decoder = MessageDecoder::new(Arc::new(HandleCache::new()), &config.post_collection);
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                url,
                hub: Arc::new(SubscriptionHub::new()),
                decoder,
                bridges: BridgeRegistry::default(),
                control: Mutex::new(Controller::default()),
            }),
        })
    }

    /// Open the transport and wait for the handshake.
    ///
    /// Idempotent: returns `Ok(())` straight away while a session is already
    /// connecting or connected. A failed handshake is also reported through
    /// the `error` event and may schedule a reconnect.
    ///
    /// A caller connect starts a fresh reconnect budget: the attempt counter
    /// returns to 0, so a connect after `max_reconnect_reached` may retry
    /// `max_attempts` times again.
    ///
    /// # Errors
    ///
    /// [`StreamError::Transport`] when the handshake fails, or
    /// [`StreamError::Aborted`] when `disconnect()` runs first.
    pub async fn connect(&self) -> Result<()> {
        let Some(opened) = self.inner.start_session(Trigger::Caller) else {
            debug!(state = %self.connection_state(), "connect ignored, session already active");
            return Ok(());
        };
        opened.await.unwrap_or(Err(StreamError::Aborted))
    }

    /// Close the transport, cancel any pending reconnect, and end every stream.
    ///
    /// Safe to call in any state.
    pub fn disconnect(&self) {
        let was_active = {
            let mut control = self.inner.control.lock();
            control.armed = false;
            if let Some(timer) = control.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(session) = control.session.take() {
                session.cancel();
            }
            control.generation += 1;
            control.attempts = 0;
            let was_active = control.state != ConnectionState::Disconnected;
            control.state = ConnectionState::Disconnected;
            was_active
        };

        if was_active {
            info!(url = %self.inner.url, "disconnected by caller");
            let _ = self.inner.hub.emit(&FeedEvent::Disconnected {
                code: Some(CLIENT_CLOSE_CODE),
                reason: Some(CLIENT_CLOSE_REASON.to_string()),
            });
        }
        self.inner.bridges.finish_all();
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Current transport state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.control.lock().state
    }

    /// Reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.control.lock().attempts
    }

    /// Register a push handler. See [`SubscriptionHub::on`].
    pub fn on<F>(&self, category: impl Into<EventCategory>, handler: F) -> SubscriptionId
    where
        F: Fn(&FeedEvent) -> std::result::Result<(), skystream_core::HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.inner.hub.on(category, handler)
    }

    /// Remove a push handler. Returns whether it was registered.
    pub fn off(&self, category: &EventCategory, id: SubscriptionId) -> bool {
        self.inner.hub.off(category, id)
    }

    /// Deliver a caller-defined event to handlers registered under `name`.
    pub fn emit_custom(&self, name: impl Into<String>, data: Value) -> usize {
        self.inner.hub.emit(&FeedEvent::Custom {
            name: name.into(),
            data,
        })
    }

    /// Every projected post from now on.
    pub fn stream_posts(&self) -> PostStream {
        PostStream::register(&self.inner.bridges)
    }

    /// Commit, identity, and account events for `did` from now on.
    pub fn stream_from_account(&self, did: impl Into<String>) -> AccountStream {
        AccountStream::register(&self.inner.bridges, &self.inner.hub, did)
    }

    /// Posts mentioning or authored by `handle` from now on.
    pub fn stream_mentions(&self, handle: &str) -> MentionStream {
        MentionStream::register(&self.inner.bridges, handle)
    }

    /// Copy of every known DID → handle mapping.
    pub fn handle_cache(&self) -> HashMap<String, String> {
        self.inner.decoder.cache().snapshot()
    }

    /// Last known handle for `did`.
    pub fn handle(&self, did: &str) -> Option<String> {
        self.inner.decoder.cache().get(did)
    }

    /// Subscribe URL including filter parameters.
    pub fn subscribe_url(&self) -> &str {
        &self.inner.url
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl fmt::Debug for FirehoseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.inner.control.lock();
        f.debug_struct("FirehoseClient")
            .field("url", &self.inner.url)
            .field("state", &control.state)
            .field("attempts", &control.attempts)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session task
// ─────────────────────────────────────────────────────────────────────────────

impl ClientInner {
    /// Move to `Connecting` and spawn a session task.
    ///
    /// Returns `None` when a session is already active or a stale timer fired.
    fn start_session(self: &Arc<Self>, trigger: Trigger) -> Option<oneshot::Receiver<Result<()>>> {
        let (generation, token) = {
            let mut control = self.control.lock();
            if control.state != ConnectionState::Disconnected {
                return None;
            }
            match trigger {
                Trigger::Caller => {
                    if let Some(timer) = control.reconnect_timer.take() {
                        timer.abort();
                    }
                    control.armed = true;
                    control.attempts = 0;
                }
                Trigger::Timer(closed) => {
                    if control.generation != closed || !control.armed {
                        return None;
                    }
                    // The timer task is the caller; don't abort it.
                    control.reconnect_timer = None;
                }
            }
            control.state = ConnectionState::Connecting;
            control.generation += 1;
            let token = CancellationToken::new();
            control.session = Some(token.clone());
            (control.generation, token)
        };

        let (opened_tx, opened_rx) = oneshot::channel();
        let inner = Arc::clone(self);
        drop(tokio::spawn(async move {
            inner.run_session(generation, token, opened_tx).await;
        }));
        Some(opened_rx)
    }

    async fn run_session(
        self: Arc<Self>,
        generation: u64,
        token: CancellationToken,
        opened: oneshot::Sender<Result<()>>,
    ) {
        debug!(url = %self.url, generation, "opening transport");
        let handshake = tokio::select! {
            () = token.cancelled() => {
                debug!(generation, "handshake cancelled");
                return;
            }
            result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
        };

        let mut ws = match handshake {
            Ok((ws, _response)) => ws,
            Err(e) => {
                let error = StreamError::transport(&self.url, e);
                warn!(url = %self.url, %error, "transport failed to open");
                let _ = self.hub.emit(&FeedEvent::Error(error.clone()));
                let _ = opened.send(Err(error));
                self.handle_close(generation, None);
                return;
            }
        };

        if !self.mark_open(generation) {
            debug!(generation, "session superseded during handshake");
            let _ = ws.close(None).await;
            return;
        }
        info!(url = %self.url, "connected");
        let _ = self.hub.emit(&FeedEvent::Connected {
            url: self.url.clone(),
        });
        let _ = opened.send(Ok(()));

        let mut close: Option<(u16, String)> = None;
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => None,
                frame = ws.next() => Some(frame),
            };
            let Some(frame) = next else {
                debug!(generation, "session cancelled, closing transport");
                let _ = ws.close(None).await;
                return;
            };

            match frame {
                Some(Ok(Message::Text(text))) => self.dispatch(self.decoder.decode(text.as_str())),
                Some(Ok(Message::Binary(bytes))) => self.dispatch(self.decoder.decode_bytes(&bytes)),
                Some(Ok(Message::Close(frame))) => {
                    close = frame.map(|f| (u16::from(f.code), f.reason.as_str().to_string()));
                    debug!(generation, ?close, "close frame received");
                }
                // Ping/pong replies are handled by tungstenite
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => break,
                Some(Err(e)) => {
                    let error = StreamError::transport(&self.url, e);
                    warn!(url = %self.url, %error, "transport error");
                    let _ = self.hub.emit(&FeedEvent::Error(error));
                    break;
                }
            }
        }

        self.handle_close(generation, close);
    }

    fn mark_open(&self, generation: u64) -> bool {
        let mut control = self.control.lock();
        if control.generation != generation || control.state != ConnectionState::Connecting {
            return false;
        }
        control.state = ConnectionState::Connected;
        control.attempts = 0;
        true
    }

    /// Fan one decoded frame out to the hub and the post bridges.
    fn dispatch(&self, decoded: Result<DecodedFrame>) {
        let DecodedFrame { event, post } = match decoded {
            Ok(frame) => frame,
            Err(error) => {
                warn!(code = error.code(), %error, "dropping malformed frame");
                let _ = self.hub.emit(&FeedEvent::ParseError(error));
                return;
            }
        };

        trace!(
            kind = event.kind(),
            did = event.did(),
            at = ?event.timestamp(),
            "frame decoded"
        );
        let event = match event {
            RawEvent::Commit(commit) => FeedEvent::Commit(commit),
            RawEvent::Identity(identity) => FeedEvent::Identity(identity),
            RawEvent::Account(account) => FeedEvent::Account(account),
        };
        let _ = self.hub.emit(&event);

        if let Some(post) = post {
            trace!(uri = %post.uri, reply = post.is_reply(), "post projected");
            let _ = self.hub.emit(&FeedEvent::Post(post.clone()));
            let _ = self.bridges.posts.broadcast(&post);
        }
    }

    /// Close transition: publish the loss, then reconnect or give up.
    fn handle_close(self: &Arc<Self>, generation: u64, close: Option<(u16, String)>) {
        {
            let mut control = self.control.lock();
            if control.generation != generation {
                debug!(generation, "ignoring close of superseded session");
                return;
            }
            control.state = ConnectionState::Disconnected;
            control.session = None;
        }

        let (code, reason) = close.unzip();
        info!(url = %self.url, ?code, ?reason, "transport closed");
        let _ = self.hub.emit(&FeedEvent::Disconnected { code, reason });

        let after = {
            let mut control = self.control.lock();
            // A handler may have called connect() or disconnect().
            if control.generation != generation || control.state != ConnectionState::Disconnected {
                return;
            }
            let policy = &self.config.reconnect;
            if !control.armed || !policy.enabled {
                AfterClose::Stop
            } else if policy.allows_attempt(control.attempts) {
                let delay = policy.delay(control.attempts);
                control.attempts = control.attempts.saturating_add(1);
                let inner = Arc::clone(self);
                if let Some(previous) = control.reconnect_timer.replace(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.fire_reconnect(generation);
                })) {
                    previous.abort();
                }
                AfterClose::Reconnect {
                    delay,
                    attempt: control.attempts,
                }
            } else {
                AfterClose::Exhausted {
                    attempts: control.attempts,
                }
            }
        };

        match after {
            AfterClose::Reconnect { delay, attempt } => {
                info!(attempt, delay_ms = delay.as_millis(), "reconnect scheduled");
            }
            AfterClose::Exhausted { attempts } => {
                let error = StreamError::ReconnectExhausted { attempts };
                warn!(%error, "reconnect budget exhausted");
                let _ = self.hub.emit(&FeedEvent::MaxReconnectReached { attempts });
                self.bridges.finish_all();
            }
            AfterClose::Stop => {
                debug!("reconnect disabled, ending streams");
                self.bridges.finish_all();
            }
        }
    }

    fn fire_reconnect(self: &Arc<Self>, closed_generation: u64) {
        if self.start_session(Trigger::Timer(closed_generation)).is_some() {
            debug!(closed_generation, "reconnect attempt started");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
