//! Settings type definitions.
//!
//! All types use camelCase JSON and `#[serde(default)]`, so a partial file
//! only overrides the keys it names.

use serde::{Deserialize, Serialize};
use skystream_core::backoff::ReconnectPolicy;
use skystream_core::constants::{DEFAULT_ENDPOINT, POST_COLLECTION};
use skystream_core::logging::LogFormat;

/// Root settings.
///
/// ```json
/// {
///   "stream": { "wantedCollections": ["app.bsky.feed.post"] },
///   "reconnect": { "maxAttempts": 0 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkystreamSettings {
    /// Endpoint and server-side filters.
    pub stream: StreamSettings,
    /// Reconnect behaviour.
    pub reconnect: ReconnectPolicy,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Endpoint and server-side filters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// Subscribe endpoint URL.
    pub endpoint: String,
    /// Collection NSIDs to receive. Empty means all.
    pub wanted_collections: Vec<String>,
    /// Account ids to receive. Empty means all.
    pub wanted_dids: Vec<String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            wanted_collections: vec![POST_COLLECTION.to_string()],
            wanted_dids: Vec::new(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
