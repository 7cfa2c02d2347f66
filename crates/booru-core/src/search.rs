use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::{
    fetcher::Fetcher,
    provider::{BooruProvider, ImageResult},
    query::{build_query, BuiltQuery},
    Error, Result,
};

/// Outcome of one search: the filtered, score-sorted entries and the query
/// that produced them.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub entries: Vec<ImageResult>,
    pub query: BuiltQuery,
}

impl SearchOutcome {
    /// True when the user gave no tags (the query fell back to the recency window).
    pub fn was_empty_search(&self) -> bool {
        self.query.sort_by_score
    }
}

/// Issues provider searches through the shared [`Fetcher`].
pub struct SearchClient {
    provider: Arc<dyn BooruProvider>,
    fetcher: Arc<Fetcher>,
    blocked_tags: Vec<String>,
}

impl SearchClient {
    pub fn new(
        provider: Arc<dyn BooruProvider>,
        fetcher: Arc<Fetcher>,
        blocked_tags: Vec<String>,
    ) -> Self {
        Self {
            provider,
            fetcher,
            blocked_tags,
        }
    }

    pub fn provider(&self) -> &Arc<dyn BooruProvider> {
        &self.provider
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    pub async fn search(&self, free_text: &str, limiter: Option<&str>) -> Result<SearchOutcome> {
        self.search_at(free_text, limiter, Utc::now()).await
    }

    /// Like [`SearchClient::search`] with an explicit clock for the recency window.
    pub async fn search_at(
        &self,
        free_text: &str,
        limiter: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SearchOutcome> {
        let query = build_query(
            self.provider.dialect(),
            free_text,
            limiter,
            &self.blocked_tags,
            now,
        );
        let url = self.provider.search_url(&query)?;
        let body = self.fetcher.fetch(&url, &query.cache_key).await?;

        let entries = self.extract_entries(&body)?;
        let total = entries.len();
        let mut entries: Vec<ImageResult> = entries
            .into_iter()
            .filter(|e| self.provider.is_deliverable(e))
            .collect();
        // `sort_by` is stable: equal scores keep provider order.
        entries.sort_by(|a, b| b.score.cmp(&a.score));

        debug!(
            provider = self.provider.kind().name(),
            cache_key = %query.cache_key,
            total,
            kept = entries.len(),
            "search finished"
        );
        Ok(SearchOutcome { entries, query })
    }

    fn extract_entries(&self, body: &[u8]) -> Result<Vec<ImageResult>> {
        let field = self.provider.results_field();
        let root: Value = serde_json::from_slice(body)?;
        let Value::Object(mut root) = root else {
            return Err(Error::Parse("response envelope is not an object".to_string()));
        };
        let raw = root
            .remove(field)
            .ok_or_else(|| Error::Parse(format!("response has no \"{field}\" field")))?;
        if !raw.is_array() {
            return Err(Error::Parse(format!("\"{field}\" is not an array")));
        }
        self.provider.parse_entries(raw)
    }
}
