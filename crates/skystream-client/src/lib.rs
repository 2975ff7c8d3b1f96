//! # skystream-client
//!
//! Streaming client for a Jetstream-style firehose.
//!
//! - **Controller**: [`FirehoseClient`] owns one WebSocket session, tracks
//!   [`ConnectionState`], and reconnects with capped exponential backoff
//! - **Decoder**: [`MessageDecoder`] turns frames into typed events and
//!   projects new posts, feeding the [`HandleCache`]
//! - **Push**: [`SubscriptionHub`] delivers [`FeedEvent`]s to handlers by
//!   [`EventCategory`]
//! - **Pull**: [`PostStream`], [`AccountStream`], [`MentionStream`] built on
//!   [`bridge::PullQueue`]
//!
//! ```no_run
//! # async fn run() -> skystream_core::Result<()> {
//! use skystream_client::{ClientConfig, FirehoseClient};
//!
//! let client = FirehoseClient::new(ClientConfig::default())?;
//! let mut posts = client.stream_posts();
//! client.connect().await?;
//! while let Some(post) = posts.next().await {
//!     println!("{}: {}", post.author_did, post.text);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod bridge;
pub mod client;
pub mod config;
pub mod decoder;
pub mod hub;
pub mod identity;
pub mod projection;
pub mod streams;
pub mod url;

pub use client::{ConnectionState, FirehoseClient};
pub use config::{ClientConfig, SubscriptionFilter};
pub use decoder::{DecodedFrame, MessageDecoder};
pub use hub::{EventCategory, FeedEvent, Handler, SubscriptionHub, SubscriptionId};
pub use identity::HandleCache;
pub use streams::{AccountStream, MentionStream, PostStream, mentions_handle};
