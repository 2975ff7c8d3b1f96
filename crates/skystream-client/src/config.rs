//! Client configuration.

use serde::{Deserialize, Serialize};
use skystream_core::backoff::ReconnectPolicy;
use skystream_core::constants::{DEFAULT_ENDPOINT, POST_COLLECTION};

/// Server-side filter, fixed for the lifetime of a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    wanted_collections: Vec<String>,
    wanted_dids: Vec<String>,
}

impl SubscriptionFilter {
    /// Build a filter. Empty lists mean "everything".
    pub fn new<C, D>(collections: C, dids: D) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            wanted_collections: collections.into_iter().map(Into::into).collect(),
            wanted_dids: dids.into_iter().map(Into::into).collect(),
        }
    }

    /// Wanted collection NSIDs.
    pub fn wanted_collections(&self) -> &[String] {
        &self.wanted_collections
    }

    /// Wanted account ids.
    pub fn wanted_dids(&self) -> &[String] {
        &self.wanted_dids
    }
}

/// Configuration for a [`FirehoseClient`](crate::FirehoseClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Subscribe endpoint (`ws://` or `wss://`).
    pub endpoint: String,
    /// Server-side filter encoded into the subscribe URL.
    pub filter: SubscriptionFilter,
    /// Reconnect behaviour after the transport closes.
    pub reconnect: ReconnectPolicy,
    /// Collection whose create commits are projected into posts.
    pub post_collection: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            filter: SubscriptionFilter::default(),
            reconnect: ReconnectPolicy::default(),
            post_collection: POST_COLLECTION.to_string(),
        }
    }
}

impl ClientConfig {
    /// Default configuration against a specific endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Replace the server-side filter.
    #[must_use]
    pub fn with_filter(mut self, filter: SubscriptionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.post_collection, POST_COLLECTION);
        assert!(cfg.filter.wanted_collections().is_empty());
        assert!(cfg.reconnect.enabled);
        assert_eq!(cfg.reconnect.max_attempts, 10);
    }

    #[test]
    fn filter_accepts_str_and_string() {
        let filter = SubscriptionFilter::new(["app.bsky.feed.post"], vec![String::from("did:plc:a")]);
        assert_eq!(filter.wanted_collections(), ["app.bsky.feed.post"]);
        assert_eq!(filter.wanted_dids(), ["did:plc:a"]);
    }

    #[test]
    fn builder_methods() {
        let cfg = ClientConfig::new("ws://127.0.0.1:6008/subscribe")
            .with_filter(SubscriptionFilter::new(["a"], Vec::<String>::new()))
            .with_reconnect(ReconnectPolicy::disabled());
        assert_eq!(cfg.endpoint, "ws://127.0.0.1:6008/subscribe");
        assert_eq!(cfg.filter.wanted_collections(), ["a"]);
        assert!(!cfg.reconnect.enabled);
    }
}
