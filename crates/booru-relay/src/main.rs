use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use booru_core::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    booru_core::logging::init("booru-relay")?;

    let cfg = Arc::new(Config::load().context("couldn't load configuration")?);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("ctrl-c received, shutting down"),
                Err(e) => warn!("couldn't listen for ctrl-c: {e}"),
            }
            cancel.cancel();
        });
    }

    booru_telegram::run_polling(cfg, cancel)
        .await
        .context("telegram bot failed")?;

    Ok(())
}
