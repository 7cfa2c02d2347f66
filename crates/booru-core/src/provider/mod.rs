//! Booru-style image providers.
//!
//! Each provider knows its tag dialect, how to turn a [`BuiltQuery`] into a
//! search URL, where the results live in its JSON envelope, and how to map
//! its entries onto [`ImageResult`].

use std::{collections::BTreeMap, sync::Arc};

use reqwest::Url;
use serde::Deserialize;

use crate::{query::BuiltQuery, query::TagDialect, Result};

pub mod derpibooru;
pub mod e621;

pub use derpibooru::Derpibooru;
pub use e621::E621;

/// Representation label for a motion (video) rendition of an entry.
pub const REPR_MP4: &str = "mp4";
/// Representation label for a thumbnail.
pub const REPR_THUMB: &str = "thumb";

/// One search hit, normalized across providers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageResult {
    pub id: i64,
    pub width: u32,
    pub height: u32,
    pub original_format: String,
    pub score: i64,
    /// Size/kind label ("thumb", "tall", "mp4", "full", ...) to URL.
    pub representations: BTreeMap<String, String>,
    pub size_bytes: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Derpibooru,
    E621,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Derpibooru => "derpibooru",
            ProviderKind::E621 => "e621",
        }
    }

    pub fn default_requests_per_second(self) -> u32 {
        match self {
            ProviderKind::Derpibooru => 10,
            ProviderKind::E621 => 1,
        }
    }

    /// Construct the provider, optionally pointed at a different base URL.
    pub fn build(
        self,
        base_url: Option<&str>,
        api_key: Option<String>,
    ) -> Result<Arc<dyn BooruProvider>> {
        Ok(match self {
            ProviderKind::Derpibooru => Arc::new(Derpibooru::new(base_url, api_key)?),
            ProviderKind::E621 => Arc::new(E621::new(base_url, api_key)?),
        })
    }
}

pub trait BooruProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn dialect(&self) -> &TagDialect;

    fn base_url(&self) -> &Url;

    /// Full search URL for a built query (credentials included).
    fn search_url(&self, query: &BuiltQuery) -> Result<String>;

    /// Name of the array field holding results in the response envelope.
    fn results_field(&self) -> &'static str;

    /// Decode the results array.
    fn parse_entries(&self, raw: serde_json::Value) -> Result<Vec<ImageResult>>;

    /// Static (or size-limited) media URL suitable for delivery.
    fn media_url(&self, entry: &ImageResult) -> Option<String>;

    /// Formats that cannot be delivered at all.
    fn disallowed_formats(&self) -> &'static [&'static str] {
        &[]
    }

    fn permalink(&self, id: i64) -> String {
        let mut url = self.base_url().clone();
        url.set_path(&id.to_string());
        url.set_query(None);
        url.to_string()
    }

    fn is_deliverable(&self, entry: &ImageResult) -> bool {
        let format = entry.original_format.to_lowercase();
        if self.disallowed_formats().contains(&format.as_str()) {
            return false;
        }
        self.media_url(entry).is_some()
    }

    /// Motion rendition, preferred over the static one when present.
    fn animation_url(&self, entry: &ImageResult) -> Option<String> {
        entry
            .representations
            .get(REPR_MP4)
            .and_then(|u| resolve_media_url(self.base_url(), u))
    }

    fn thumb_url(&self, entry: &ImageResult) -> Option<String> {
        entry
            .representations
            .get(REPR_THUMB)
            .and_then(|u| resolve_media_url(self.base_url(), u))
            .or_else(|| self.media_url(entry))
    }
}

/// Make a provider media URL absolute (`//cdn/x` and `/x` become `https://...`).
pub fn resolve_media_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    base.join(raw).ok().map(|u| u.to_string())
}

pub(crate) fn parse_base_url(base_url: Option<&str>, default: &str) -> Result<Url> {
    let raw = base_url.unwrap_or(default);
    Url::parse(raw)
        .map_err(|e| crate::Error::Config(format!("invalid provider base url {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_scheme_relative_and_path_urls() {
        let base = Url::parse("https://derpibooru.org").unwrap();
        assert_eq!(
            resolve_media_url(&base, "//derpicdn.net/img/1/tall.png").as_deref(),
            Some("https://derpicdn.net/img/1/tall.png")
        );
        assert_eq!(
            resolve_media_url(&base, "/img/1/thumb.png").as_deref(),
            Some("https://derpibooru.org/img/1/thumb.png")
        );
        assert_eq!(
            resolve_media_url(&base, "http://other.test/a.gif").as_deref(),
            Some("http://other.test/a.gif")
        );
        assert_eq!(resolve_media_url(&base, "  "), None);
    }

    #[test]
    fn provider_kind_defaults() {
        assert_eq!(ProviderKind::default(), ProviderKind::Derpibooru);
        assert_eq!(ProviderKind::Derpibooru.default_requests_per_second(), 10);
        assert_eq!(ProviderKind::E621.default_requests_per_second(), 1);
        assert_eq!(ProviderKind::E621.name(), "e621");
    }
}
