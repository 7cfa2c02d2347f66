/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// Where a reply goes: the chat, and the message being answered (if any).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplyTarget {
    pub chat_id: ChatId,
    pub reply_to: Option<MessageId>,
}

impl ReplyTarget {
    pub fn new(chat_id: ChatId, reply_to: Option<MessageId>) -> Self {
        Self { chat_id, reply_to }
    }
}
