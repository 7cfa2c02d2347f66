use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Url;
use serde::Deserialize;

use super::{parse_base_url, resolve_media_url, BooruProvider, ImageResult, ProviderKind};
use crate::{
    query::{BuiltQuery, TagDelimiter, TagDialect},
    Error, Result,
};

pub const DEFAULT_BASE_URL: &str = "https://derpibooru.org";
const SEARCH_PATH: &str = "/api/v1/json/search/images";
const PER_PAGE: &str = "50";
/// Representation delivered as the static image.
const DELIVERY_REPR: &str = "tall";

static DIALECT: TagDialect = TagDialect {
    delimiter: TagDelimiter::Comma,
    separator: ", ",
    default_limiter: "safe",
    window_tags: recent_window,
};

fn recent_window(now: DateTime<Utc>) -> Vec<String> {
    let from = now - Duration::hours(72);
    vec![format!(
        "created_at.gt:{}",
        from.to_rfc3339_opts(SecondsFormat::Secs, true)
    )]
}

#[derive(Debug, Deserialize)]
struct DerpiEntry {
    id: i64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default, alias = "original_format")]
    format: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    representations: BTreeMap<String, String>,
}

impl From<DerpiEntry> for ImageResult {
    fn from(e: DerpiEntry) -> Self {
        ImageResult {
            id: e.id,
            width: e.width,
            height: e.height,
            original_format: e.format.to_lowercase(),
            score: e.score,
            representations: e.representations,
            size_bytes: e.size,
        }
    }
}

#[derive(Debug)]
pub struct Derpibooru {
    base_url: Url,
    api_key: Option<String>,
}

impl Derpibooru {
    pub fn new(base_url: Option<&str>, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url, DEFAULT_BASE_URL)?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

impl BooruProvider for Derpibooru {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Derpibooru
    }

    fn dialect(&self) -> &TagDialect {
        &DIALECT
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn search_url(&self, query: &BuiltQuery) -> Result<String> {
        let mut url = self
            .base_url
            .join(SEARCH_PATH)
            .map_err(|e| Error::Config(format!("invalid derpibooru search url: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.query);
            pairs.append_pair("per_page", PER_PAGE);
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
            if query.sort_by_score {
                pairs.append_pair("sf", "score");
                pairs.append_pair("sd", "desc");
            }
        }
        Ok(url.to_string())
    }

    fn results_field(&self) -> &'static str {
        "images"
    }

    fn parse_entries(&self, raw: serde_json::Value) -> Result<Vec<ImageResult>> {
        let entries: Vec<DerpiEntry> = serde_json::from_value(raw)
            .map_err(|e| Error::Parse(format!("malformed derpibooru images: {e}")))?;
        Ok(entries.into_iter().map(ImageResult::from).collect())
    }

    fn media_url(&self, entry: &ImageResult) -> Option<String> {
        entry
            .representations
            .get(DELIVERY_REPR)
            .and_then(|u| resolve_media_url(&self.base_url, u))
    }
}
