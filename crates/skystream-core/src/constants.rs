//! Lexicon identifiers and connection defaults.

/// Collection NSID for posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Embed `$type` for an image set.
pub const EMBED_IMAGES: &str = "app.bsky.embed.images";
/// Embed `$type` for a video.
pub const EMBED_VIDEO: &str = "app.bsky.embed.video";
/// Embed `$type` for an external link card.
pub const EMBED_EXTERNAL: &str = "app.bsky.embed.external";

/// Embed kinds that count as media on a post.
pub const MEDIA_EMBED_TYPES: [&str; 3] = [EMBED_IMAGES, EMBED_VIDEO, EMBED_EXTERNAL];

/// Facet feature `$type` for a mention (carries `did`).
pub const FACET_MENTION: &str = "app.bsky.richtext.facet#mention";
/// Facet feature `$type` for a hashtag (carries `tag`).
pub const FACET_TAG: &str = "app.bsky.richtext.facet#tag";
/// Facet feature `$type` for a link (carries `uri`).
pub const FACET_LINK: &str = "app.bsky.richtext.facet#link";

/// Default public Jetstream subscribe endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://jetstream2.us-east.bsky.network/subscribe";

/// Query parameter carrying the comma-joined collection filter.
pub const PARAM_WANTED_COLLECTIONS: &str = "wantedCollections";
/// Query parameter carrying the comma-joined DID filter.
pub const PARAM_WANTED_DIDS: &str = "wantedDids";
