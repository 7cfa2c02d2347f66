use async_trait::async_trait;

use crate::{
    delivery::Delivery,
    domain::ReplyTarget,
    messaging::types::{ChatAction, InlineResult},
    Result,
};

/// Outbound side of the chat transport.
///
/// Every call is a single request; a non-success envelope is an error for
/// that call only and is never retried here.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<()>;

    async fn send_chat_action(&self, target: ReplyTarget, action: ChatAction) -> Result<()>;

    async fn send_media(&self, target: ReplyTarget, delivery: &Delivery) -> Result<()>;

    async fn answer_inline_query(&self, query_id: &str, results: &[InlineResult]) -> Result<()>;
}
