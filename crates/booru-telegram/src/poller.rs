use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use booru_core::Result;

use crate::{api::Update, handlers::Dispatcher};

/// Inbound side of the chat transport.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn poll(&self, offset: Option<i64>) -> Result<Vec<Update>>;
}

/// Single sequential long-poll loop; each update is handed to its own task.
///
/// The cursor is owned here and only moves forward. Tasks never touch it.
pub struct UpdateLoop {
    source: Arc<dyn UpdateSource>,
    dispatcher: Arc<Dispatcher>,
    last_known_update_id: i64,
    backoff: Duration,
}

impl UpdateLoop {
    pub fn new(source: Arc<dyn UpdateSource>, dispatcher: Arc<Dispatcher>, backoff: Duration) -> Self {
        Self {
            source,
            dispatcher,
            last_known_update_id: 0,
            backoff,
        }
    }

    pub fn last_known_update_id(&self) -> i64 {
        self.last_known_update_id
    }

    /// `offset` for the next poll; omitted until something was received.
    pub fn next_offset(&self) -> Option<i64> {
        (self.last_known_update_id != 0).then_some(self.last_known_update_id + 1)
    }

    /// Move the cursor to the largest id in the batch (ids may arrive unordered).
    fn advance_cursor(&mut self, updates: &[Update]) {
        if let Some(max) = updates.iter().map(|u| u.id).max() {
            self.last_known_update_id = self.last_known_update_id.max(max);
        }
    }

    /// One poll: fetch a batch, advance the cursor, spawn a task per update.
    ///
    /// The returned handles are for tests; the loop itself never awaits them.
    pub async fn poll_once(&mut self) -> Result<Vec<JoinHandle<()>>> {
        let updates = self.source.poll(self.next_offset()).await?;
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        self.advance_cursor(&updates);
        debug!(
            count = updates.len(),
            cursor = self.last_known_update_id,
            "received updates"
        );

        Ok(updates
            .into_iter()
            .map(|update| {
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move { dispatcher.handle_update(update).await })
            })
            .collect())
    }

    /// Poll until cancelled. Poll failures are logged and retried after the backoff.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("update loop started");
        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.poll_once() => polled,
            };
            if let Err(e) = polled {
                warn!(cursor = self.last_known_update_id, "couldn't get updates: {e}");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.backoff) => {}
                }
            }
        }
        info!(cursor = self.last_known_update_id, "update loop stopped");
    }
}
