use booru_core::{delivery::inline_results, provider::ProviderKind, Result};
use tracing::debug;

use crate::{api::InlineQuery, router::AppState};

/// Limiter implied by the inline query text; `None` means the provider default.
fn inline_limiter(kind: ProviderKind, text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    match kind {
        ProviderKind::Derpibooru if text.contains("explicit") => Some("explicit"),
        ProviderKind::Derpibooru if text.contains("suggestive") => Some("suggestive"),
        ProviderKind::E621 if text.contains("explicit") => Some("rating:explicit"),
        ProviderKind::E621 if text.contains("questionable") => Some("rating:questionable"),
        _ => None,
    }
}

pub(super) async fn handle_inline(state: &AppState, q: &InlineQuery) -> Result<()> {
    let provider = state.search.provider();
    let limiter = inline_limiter(provider.kind(), &q.query);

    let outcome = state.search.search(&q.query, limiter).await?;
    let results = inline_results(provider.as_ref(), &outcome.entries);
    debug!(query_id = %q.id, results = results.len(), "answering inline query");

    state.messenger.answer_inline_query(&q.id, &results).await
}
