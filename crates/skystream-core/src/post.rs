//! Flattened projection of a newly created post.

use serde::{Deserialize, Serialize};

/// Read-only view of a post derived from a create commit.
///
/// Wire format (camelCase):
/// ```json
/// {
///   "uri": "at://did:plc:abc/app.bsky.feed.post/3l3qo2vuowo2b",
///   "cid": "bafyrei...",
///   "authorDid": "did:plc:abc",
///   "authorHandle": "alice.example",
///   "text": "hi @bob.example #rust",
///   "createdAt": "2024-01-01T00:00:00Z",
///   "hasMedia": false,
///   "mentions": ["did:plc:bob"],
///   "tags": ["rust"],
///   "links": []
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPost {
    /// `at://{did}/{collection}/{rkey}`.
    pub uri: String,
    /// Content id of the record; empty when the commit carried none.
    pub cid: String,
    /// Author account id.
    pub author_did: String,
    /// Author handle, when an identity event for the author has been seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    /// Post text.
    pub text: String,
    /// Client-declared creation time; empty when the record has none.
    pub created_at: String,
    /// Whether the post embeds images, video, or an external link card.
    pub has_media: bool,
    /// URI of the post being replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_parent: Option<String>,
    /// URI of the thread root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_root: Option<String>,
    /// Mentioned account ids, in facet order.
    pub mentions: Vec<String>,
    /// Hashtags, in facet order.
    pub tags: Vec<String>,
    /// Linked URIs, in facet order.
    pub links: Vec<String>,
}

impl ProjectedPost {
    /// Build an `at://` URI for a record.
    pub fn record_uri(did: &str, collection: &str, rkey: &str) -> String {
        format!("at://{did}/{collection}/{rkey}")
    }

    /// Whether this post is a reply.
    pub fn is_reply(&self) -> bool {
        self.reply_parent.is_some()
    }
}
