//! Cache addressing
//!
//! Bucket names have the form `<namespace>_<provider>_<contentKind>_<mediaId>`,
//! e.g. `manga_mangadex_chapters_123`. Each bucket holds one entry keyed
//! `<provider>$<mediaId>`.

use serde::{Deserialize, Serialize};

pub const MANGA_NAMESPACE: &str = "manga";
pub const ONLINESTREAM_NAMESPACE: &str = "onlinestream";
pub const AGGREGATE_NAMESPACE: &str = "aggregate";

/// What a bucket's container holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Chapters,
    Volumes,
    Episodes,
    DubbedEpisodes,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Chapters => "chapters",
            ContentKind::Volumes => "volumes",
            ContentKind::Episodes => "episodes",
            ContentKind::DubbedEpisodes => "episodes-dub",
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            ContentKind::Chapters | ContentKind::Volumes => MANGA_NAMESPACE,
            ContentKind::Episodes | ContentKind::DubbedEpisodes => ONLINESTREAM_NAMESPACE,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chapters" => Some(ContentKind::Chapters),
            "volumes" => Some(ContentKind::Volumes),
            "episodes" => Some(ContentKind::Episodes),
            "episodes-dub" => Some(ContentKind::DubbedEpisodes),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity of one provider content bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub provider: String,
    pub kind: ContentKind,
    pub media_id: i64,
}

impl BucketKey {
    pub fn new(provider: impl Into<String>, kind: ContentKind, media_id: i64) -> Self {
        Self {
            provider: provider.into(),
            kind,
            media_id,
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.kind.namespace()
    }

    /// Key of the single entry stored in this bucket
    pub fn entry_key(&self) -> String {
        format!("{}${}", self.provider, self.media_id)
    }

    /// Inverse of `to_string()`; `None` for names outside the content namespaces
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.splitn(4, '_');
        let namespace = parts.next()?;
        let provider = parts.next()?;
        let kind = ContentKind::parse(parts.next()?)?;
        let media_id = parts.next()?.parse().ok()?;

        if provider.is_empty() || kind.namespace() != namespace {
            return None;
        }

        Some(Self::new(provider, kind, media_id))
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.namespace(),
            self.provider,
            self.kind,
            self.media_id
        )
    }
}

/// Named storage unit with a fixed entry TTL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    name: String,
    ttl: chrono::Duration,
}

impl Bucket {
    pub fn new(name: impl Into<String>, ttl: chrono::Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
        }
    }

    pub fn for_key(key: &BucketKey, ttl: chrono::Duration) -> Self {
        Self::new(key.to_string(), ttl)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }
}

/// True for content buckets (any provider, any kind) belonging to `media_id`
///
/// Matches on the parsed trailing segment, so invalidating 42 leaves 420 alone.
pub fn is_media_bucket(name: &str, media_id: i64) -> bool {
    BucketKey::parse(name).is_some_and(|key| key.media_id == media_id)
}
