use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use booru_core::{
    cache::ResultCache,
    config::Config,
    fetcher::{Fetcher, ReqwestHttp},
    limiter::RateLimiter,
    messaging::port::MessagingPort,
    search::SearchClient,
};

use crate::{client::TelegramClient, handlers::Dispatcher, poller::UpdateLoop};

/// Provider requests give up after this long.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared, process-wide dependencies handed to every update task.
pub struct AppState {
    pub cfg: Arc<Config>,
    pub search: Arc<SearchClient>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Wire everything together and poll until `cancel` fires.
pub async fn run_polling(cfg: Arc<Config>, cancel: CancellationToken) -> anyhow::Result<()> {
    let provider = cfg
        .provider
        .build(cfg.provider_base_url.as_deref(), cfg.provider_key.clone())?;
    let http = Arc::new(ReqwestHttp::new(&cfg.user_agent, PROVIDER_TIMEOUT)?);
    let limiter = Arc::new(RateLimiter::per_second(cfg.max_requests_per_second));
    let cache = Arc::new(ResultCache::new(cfg.cache_capacity, cfg.cache_ttl));
    let fetcher = Arc::new(Fetcher::new(http, limiter, cache));
    let search = Arc::new(SearchClient::new(
        provider,
        fetcher,
        cfg.blocked_tags.clone(),
    ));

    let client = Arc::new(TelegramClient::new(
        &cfg.telegram_api_base,
        &cfg.telegram_token,
        cfg.poll_timeout,
    )?);

    match client.get_me().await {
        Ok(me) => info!(
            username = me.username.as_deref().unwrap_or(""),
            provider = cfg.provider.name(),
            rps = cfg.max_requests_per_second,
            blocked_tags = cfg.blocked_tags.len(),
            "bot started"
        ),
        Err(e) => warn!("couldn't identify bot, polling anyway: {e}"),
    }

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        search,
        messenger: client.clone(),
    });
    let dispatcher = Arc::new(Dispatcher::new(state));

    UpdateLoop::new(client, dispatcher, cfg.poll_backoff)
        .run(cancel)
        .await;
    Ok(())
}
