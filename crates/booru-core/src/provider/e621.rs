use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::Deserialize;

use super::{
    parse_base_url, resolve_media_url, BooruProvider, ImageResult, ProviderKind, REPR_THUMB,
};
use crate::{
    query::{BuiltQuery, TagDelimiter, TagDialect},
    Error, Result,
};

pub const DEFAULT_BASE_URL: &str = "https://e621.net";
const SEARCH_PATH: &str = "/posts.json";
const PAGE_LIMIT: &str = "100";
/// Telegram refuses photos above this size; gifs go out as documents.
const MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;

const REPR_FULL: &str = "full";
const REPR_SAMPLE: &str = "sample";
const REPR_PREVIEW: &str = "preview";

static DIALECT: TagDialect = TagDialect {
    delimiter: TagDelimiter::Whitespace,
    separator: " ",
    default_limiter: "rating:safe",
    window_tags: recent_window,
};

fn recent_window(now: DateTime<Utc>) -> Vec<String> {
    let from = now - Duration::hours(72);
    vec![
        "order:score".to_string(),
        format!("date:>={}", from.format("%Y-%m-%d")),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Score {
    total: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct File {
    ext: String,
    width: u32,
    height: u32,
    url: Option<String>,
    size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sample {
    has: bool,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Preview {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: i64,
    #[serde(default)]
    score: Score,
    #[serde(default)]
    file: File,
    #[serde(default)]
    sample: Sample,
    #[serde(default)]
    preview: Preview,
}

impl From<Post> for ImageResult {
    fn from(p: Post) -> Self {
        let mut representations = std::collections::BTreeMap::new();
        let mut put = |label: &str, url: Option<String>| {
            if let Some(url) = url.filter(|u| !u.is_empty()) {
                representations.insert(label.to_string(), url);
            }
        };
        put(REPR_FULL, p.file.url);
        if p.sample.has {
            put(REPR_SAMPLE, p.sample.url);
        }
        put(REPR_THUMB, p.preview.url.clone());
        put(REPR_PREVIEW, p.preview.url);

        ImageResult {
            id: p.id,
            width: p.file.width,
            height: p.file.height,
            original_format: p.file.ext.to_lowercase(),
            score: p.score.total,
            representations,
            size_bytes: p.file.size,
        }
    }
}

#[derive(Debug)]
pub struct E621 {
    base_url: Url,
    /// `login:api_key`, sent as the two query parameters e621 expects.
    credentials: Option<(String, String)>,
}

impl E621 {
    pub fn new(base_url: Option<&str>, api_key: Option<String>) -> Result<Self> {
        let credentials = api_key.and_then(|raw| {
            let (login, key) = raw.trim().split_once(':')?;
            if login.is_empty() || key.is_empty() {
                return None;
            }
            Some((login.to_string(), key.to_string()))
        });
        Ok(Self {
            base_url: parse_base_url(base_url, DEFAULT_BASE_URL)?,
            credentials,
        })
    }
}

impl BooruProvider for E621 {
    fn kind(&self) -> ProviderKind {
        ProviderKind::E621
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
            .map_err(|e| Error::Config(format!("invalid e621 search url: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("tags", &query.query);
            pairs.append_pair("limit", PAGE_LIMIT);
            if let Some((login, key)) = &self.credentials {
                pairs.append_pair("login", login);
                pairs.append_pair("api_key", key);
            }
        }
        Ok(url.to_string())
    }

    fn results_field(&self) -> &'static str {
        "posts"
    }

    fn parse_entries(&self, raw: serde_json::Value) -> Result<Vec<ImageResult>> {
        let posts: Vec<Post> = serde_json::from_value(raw)
            .map_err(|e| Error::Parse(format!("malformed e621 posts: {e}")))?;
        Ok(posts.into_iter().map(ImageResult::from).collect())
    }

    fn disallowed_formats(&self) -> &'static [&'static str] {
        &["webm", "swf"]
    }

    fn media_url(&self, entry: &ImageResult) -> Option<String> {
        // No full file means the post is hidden from this account.
        let full = entry.representations.get(REPR_FULL)?;
        let oversized = entry.original_format != "gif"
            && entry.size_bytes.unwrap_or(0) > MAX_PHOTO_BYTES;
        let chosen = if oversized {
            entry
                .representations
                .get(REPR_SAMPLE)
                .or_else(|| entry.representations.get(REPR_PREVIEW))?
        } else {
            full
        };
        resolve_media_url(&self.base_url, chosen)
    }

    fn permalink(&self, id: i64) -> String {
        let mut url = self.base_url.clone();
        url.set_path(&format!("posts/{id}"));
        url.set_query(None);
        url.to_string()
    }
}
