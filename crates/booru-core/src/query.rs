//! Tag query construction.
//!
//! The cache key is frozen from user-controlled input (free text + limiter)
//! before operator policy (blocked tags) and time-window tags are added, so
//! policy changes never fragment the cache.

use chrono::{DateTime, Utc};

/// How free text is split into tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagDelimiter {
    Comma,
    Whitespace,
}

/// Provider-specific tag syntax.
#[derive(Clone, Copy, Debug)]
pub struct TagDialect {
    pub delimiter: TagDelimiter,
    /// Joins tags in both the query string and the cache key.
    pub separator: &'static str,
    /// Limiter appended when the caller does not name one.
    pub default_limiter: &'static str,
    /// Extra tags emulating "best of the last 3 days" for empty searches.
    pub window_tags: fn(DateTime<Utc>) -> Vec<String>,
}

/// Output of [`build_query`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltQuery {
    /// Provider query string (user tags, limiter, window tags, negated blocked tags).
    pub query: String,
    /// Sorted, deduplicated user tags followed by the limiter.
    pub cache_key: String,
    /// Set for empty searches: ask the provider to order by score, descending.
    pub sort_by_score: bool,
}

pub fn build_query(
    dialect: &TagDialect,
    free_text: &str,
    limiter: Option<&str>,
    blocked_tags: &[String],
    now: DateTime<Utc>,
) -> BuiltQuery {
    let mut tags = split_tags(free_text, dialect.delimiter);
    let empty_search = tags.is_empty();

    tags.sort();
    tags.dedup();

    // The limiter stays out of the dedup so a bare limiter key only ever
    // names the empty search.
    let limiter = limiter
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(dialect.default_limiter);
    tags.push(limiter.to_lowercase());
    let cache_key = tags.join(dialect.separator);

    if empty_search {
        tags.extend((dialect.window_tags)(now));
    }
    for blocked in blocked_tags {
        let blocked = blocked.trim().to_lowercase();
        if !blocked.is_empty() {
            tags.push(format!("-{blocked}"));
        }
    }

    tags.sort();
    tags.dedup();

    BuiltQuery {
        query: tags.join(dialect.separator),
        cache_key,
        sort_by_score: empty_search,
    }
}

/// Split, trim and lower-case user tags, dropping empties.
pub fn split_tags(free_text: &str, delimiter: TagDelimiter) -> Vec<String> {
    let parts: Box<dyn Iterator<Item = &str>> = match delimiter {
        TagDelimiter::Comma => Box::new(free_text.split(',')),
        TagDelimiter::Whitespace => Box::new(free_text.split_whitespace()),
    };
    parts
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
