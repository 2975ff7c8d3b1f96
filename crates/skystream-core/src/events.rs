//! Firehose wire events.
//!
//! Every frame is a JSON object with `did`, `time_us`, a `kind`
//! discriminator, and a payload object named after the kind:
//!
//! ```json
//! {
//!   "did": "did:plc:abc",
//!   "time_us": 1725911162329308,
//!   "kind": "commit",
//!   "commit": {
//!     "rev": "3l3qo2vutsw2b",
//!     "operation": "create",
//!     "collection": "app.bsky.feed.post",
//!     "rkey": "3l3qo2vuowo2b",
//!     "record": { "text": "hello", "createdAt": "2024-09-09T19:46:02.102Z" },
//!     "cid": "bafyrei..."
//!   }
//! }
//! ```
//!
//! Unknown fields are ignored so newer server payloads keep decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded firehose frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawEvent {
    /// A record was created, updated, or deleted.
    Commit(CommitEvent),
    /// An account's handle or identity document changed.
    Identity(IdentityEvent),
    /// An account's hosting status changed.
    Account(AccountEvent),
}

impl RawEvent {
    /// The account the event belongs to.
    pub fn did(&self) -> &str {
        match self {
            Self::Commit(e) => &e.did,
            Self::Identity(e) => &e.did,
            Self::Account(e) => &e.did,
        }
    }

    /// Server timestamp in microseconds since the Unix epoch.
    pub fn time_us(&self) -> u64 {
        match self {
            Self::Commit(e) => e.time_us,
            Self::Identity(e) => e.time_us,
            Self::Account(e) => e.time_us,
        }
    }

    /// The wire `kind` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Commit(_) => "commit",
            Self::Identity(_) => "identity",
            Self::Account(_) => "account",
        }
    }

    /// Server timestamp as a UTC datetime, if it is in range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let micros = i64::try_from(self.time_us()).ok()?;
        DateTime::from_timestamp_micros(micros)
    }
}

/// A commit frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitEvent {
    /// Repository owner.
    pub did: String,
    /// Server timestamp (microseconds).
    pub time_us: u64,
    /// Commit payload.
    pub commit: CommitInfo,
}

/// Commit payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Repository revision tag.
    pub rev: String,
    /// What happened to the record.
    pub operation: CommitOperation,
    /// Collection NSID.
    pub collection: String,
    /// Record key within the collection.
    pub rkey: String,
    /// Decoded record body (absent on deletes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    /// Content id of the record (absent on deletes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// Commit operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitOperation {
    /// A new record.
    Create,
    /// An existing record was replaced.
    Update,
    /// A record was removed.
    Delete,
}

impl CommitOperation {
    /// Wire name of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// An identity frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityEvent {
    /// Account whose identity changed.
    pub did: String,
    /// Server timestamp (microseconds).
    pub time_us: u64,
    /// Identity payload.
    pub identity: IdentityInfo,
}

/// Identity payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityInfo {
    /// Account id.
    pub did: String,
    /// Current handle. Servers omit it when the handle is unverified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Upstream sequence number.
    pub seq: u64,
    /// Upstream event time (RFC 3339).
    pub time: String,
}

/// An account frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountEvent {
    /// Account whose status changed.
    pub did: String,
    /// Server timestamp (microseconds).
    pub time_us: u64,
    /// Account payload.
    pub account: AccountInfo,
}

/// Account payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Whether the account is active on its host.
    pub active: bool,
    /// Reason for inactivity (`takendown`, `suspended`, `deactivated`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Upstream sequence number.
    pub seq: u64,
    /// Upstream event time (RFC 3339).
    pub time: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
