//! Derivation of [`ProjectedPost`] from create commits.

use serde_json::Value;
use skystream_core::constants::{FACET_LINK, FACET_MENTION, FACET_TAG, MEDIA_EMBED_TYPES};
use skystream_core::{CommitEvent, CommitOperation, ProjectedPost};

/// Project a commit into a post.
///
/// Returns `None` unless the commit creates a record in `post_collection`
/// whose body has a string `text`. `author_handle` is only consulted for
/// commits that qualify.
pub fn project_post(
    event: &CommitEvent,
    post_collection: &str,
    author_handle: impl FnOnce() -> Option<String>,
) -> Option<ProjectedPost> {
    let commit = &event.commit;
    if commit.operation != CommitOperation::Create || commit.collection != post_collection {
        return None;
    }
    let record = commit.record.as_ref()?;
    let text = record.get("text")?.as_str()?;

    let mut post = ProjectedPost {
        uri: ProjectedPost::record_uri(&event.did, &commit.collection, &commit.rkey),
        cid: commit.cid.clone().unwrap_or_default(),
        author_did: event.did.clone(),
        author_handle: author_handle(),
        text: text.to_string(),
        created_at: str_at(record, &["createdAt"]).unwrap_or_default(),
        has_media: has_media(record),
        reply_parent: str_at(record, &["reply", "parent", "uri"]),
        reply_root: str_at(record, &["reply", "root", "uri"]),
        ..ProjectedPost::default()
    };
    collect_facets(record, &mut post);
    Some(post)
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |node, key| node.get(key))?
        .as_str()
        .map(ToString::to_string)
}

fn has_media(record: &Value) -> bool {
    record
        .get("embed")
        .and_then(|embed| embed.get("$type"))
        .and_then(Value::as_str)
        .is_some_and(|kind| MEDIA_EMBED_TYPES.contains(&kind))
}

/// Scan `facets[].features[]` for mentions, tags, and links.
fn collect_facets(record: &Value, post: &mut ProjectedPost) {
    let Some(facets) = record.get("facets").and_then(Value::as_array) else {
        return;
    };
    let features = facets
        .iter()
        .filter_map(|facet| facet.get("features")?.as_array())
        .flatten();

    for feature in features {
        let Some(kind) = feature.get("$type").and_then(Value::as_str) else {
            continue;
        };
        let (field, target) = match kind {
            FACET_MENTION => ("did", &mut post.mentions),
            FACET_TAG => ("tag", &mut post.tags),
            FACET_LINK => ("uri", &mut post.links),
            _ => continue,
        };
        if let Some(value) = feature.get(field).and_then(Value::as_str) {
            target.push(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skystream_core::CommitInfo;
    use skystream_core::constants::POST_COLLECTION;

    fn commit(operation: CommitOperation, collection: &str, record: Option<Value>) -> CommitEvent {
        CommitEvent {
            did: "did:plc:alice".into(),
            time_us: 1,
            commit: CommitInfo {
                rev: "rev1".into(),
                operation,
                collection: collection.into(),
                rkey: "3kpost".into(),
                record,
                cid: Some("bafycid".into()),
            },
        }
    }

    fn project(event: &CommitEvent) -> Option<ProjectedPost> {
        project_post(event, POST_COLLECTION, || None)
    }

    #[test]
    fn projects_plain_post() {
        let event = commit(
            CommitOperation::Create,
            POST_COLLECTION,
            Some(json!({"text": "hello", "createdAt": "2024-01-01T00:00:00Z"})),
        );
        let post = project(&event).unwrap();
        assert_eq!(post.uri, "at://did:plc:alice/app.bsky.feed.post/3kpost");
        assert_eq!(post.cid, "bafycid");
        assert_eq!(post.author_did, "did:plc:alice");
        assert_eq!(post.text, "hello");
        assert_eq!(post.created_at, "2024-01-01T00:00:00Z");
        assert!(!post.has_media);
        assert!(post.reply_parent.is_none());
        assert!(post.mentions.is_empty());
    }

    #[test]
    fn non_create_operations_do_not_project() {
        for op in [CommitOperation::Update, CommitOperation::Delete] {
            let event = commit(op, POST_COLLECTION, Some(json!({"text": "hello"})));
            assert!(project(&event).is_none(), "{op:?} projected");
        }
    }

    #[test]
    fn other_collections_do_not_project() {
        let event = commit(
            CommitOperation::Create,
            "app.bsky.feed.like",
            Some(json!({"text": "hello"})),
        );
        assert!(project(&event).is_none());
    }

    #[test]
    fn missing_or_non_string_text_does_not_project() {
        let no_record = commit(CommitOperation::Create, POST_COLLECTION, None);
        assert!(project(&no_record).is_none());
        let no_text = commit(CommitOperation::Create, POST_COLLECTION, Some(json!({})));
        assert!(project(&no_text).is_none());
        let number_text = commit(CommitOperation::Create, POST_COLLECTION, Some(json!({"text": 5})));
        assert!(project(&number_text).is_none());
    }

    #[test]
    fn author_handle_only_looked_up_for_posts() {
        let like = commit(CommitOperation::Create, "app.bsky.feed.like", Some(json!({"text": "x"})));
        let result = project_post(&like, POST_COLLECTION, || panic!("looked up handle"));
        assert!(result.is_none());

        let post = commit(CommitOperation::Create, POST_COLLECTION, Some(json!({"text": "x"})));
        let projected = project_post(&post, POST_COLLECTION, || Some("alice.example".into())).unwrap();
        assert_eq!(projected.author_handle.as_deref(), Some("alice.example"));
    }

    #[test]
    fn media_embed_kinds() {
        for kind in MEDIA_EMBED_TYPES {
            let event = commit(
                CommitOperation::Create,
                POST_COLLECTION,
                Some(json!({"text": "pic", "embed": {"$type": kind}})),
            );
            assert!(project(&event).unwrap().has_media, "{kind} not media");
        }
        let quote = commit(
            CommitOperation::Create,
            POST_COLLECTION,
            Some(json!({"text": "quote", "embed": {"$type": "app.bsky.embed.record"}})),
        );
        assert!(!project(&quote).unwrap().has_media);
    }

    #[test]
    fn reply_references() {
        let event = commit(
            CommitOperation::Create,
            POST_COLLECTION,
            Some(json!({
                "text": "agreed",
                "reply": {
                    "parent": {"uri": "at://did:plc:bob/app.bsky.feed.post/p", "cid": "c1"},
                    "root": {"uri": "at://did:plc:carol/app.bsky.feed.post/r", "cid": "c2"}
                }
            })),
        );
        let post = project(&event).unwrap();
        assert_eq!(post.reply_parent.as_deref(), Some("at://did:plc:bob/app.bsky.feed.post/p"));
        assert_eq!(post.reply_root.as_deref(), Some("at://did:plc:carol/app.bsky.feed.post/r"));
        assert!(post.is_reply());
    }

    #[test]
    fn facets_collect_mentions_tags_links() {
        let event = commit(
            CommitOperation::Create,
            POST_COLLECTION,
            Some(json!({
                "text": "hi @bob #rust https://example.com",
                "facets": [
                    {"index": {"byteStart": 3, "byteEnd": 7},
                     "features": [{"$type": FACET_MENTION, "did": "did:plc:bob"}]},
                    {"index": {"byteStart": 8, "byteEnd": 13},
                     "features": [{"$type": FACET_TAG, "tag": "rust"}]},
                    {"index": {"byteStart": 14, "byteEnd": 33},
                     "features": [{"$type": FACET_LINK, "uri": "https://example.com"}]}
                ]
            })),
        );
        let post = project(&event).unwrap();
        assert_eq!(post.mentions, vec!["did:plc:bob"]);
        assert_eq!(post.tags, vec!["rust"]);
        assert_eq!(post.links, vec!["https://example.com"]);
    }

    #[test]
    fn malformed_facets_are_skipped() {
        let event = commit(
            CommitOperation::Create,
            POST_COLLECTION,
            Some(json!({
                "text": "messy",
                "facets": [
                    "not an object",
                    {"features": "not an array"},
                    {"features": [
                        42,
                        {"did": "did:plc:untyped"},
                        {"$type": FACET_MENTION},
                        {"$type": FACET_MENTION, "did": 7},
                        {"$type": "app.bsky.richtext.facet#unknown", "value": "x"},
                        {"$type": FACET_TAG, "tag": "kept"}
                    ]}
                ]
            })),
        );
        let post = project(&event).unwrap();
        assert!(post.mentions.is_empty());
        assert_eq!(post.tags, vec!["kept"]);
        assert!(post.links.is_empty());
    }

    #[test]
    fn facets_not_an_array_is_ignored() {
        let event = commit(
            CommitOperation::Create,
            POST_COLLECTION,
            Some(json!({"text": "x", "facets": {"oops": true}})),
        );
        assert!(project(&event).unwrap().tags.is_empty());
    }

    #[test]
    fn missing_cid_becomes_empty() {
        let mut event = commit(CommitOperation::Create, POST_COLLECTION, Some(json!({"text": "x"})));
        event.commit.cid = None;
        assert_eq!(project(&event).unwrap().cid, "");
    }
}
