use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use booru_core::{
    delivery::{Delivery, MediaKind, MediaSource},
    domain::ReplyTarget,
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKind, InlineResult},
    },
    Result,
};

use crate::{
    api::{ApiResponse, Update, User},
    form::FormFields,
    poller::UpdateSource,
};

/// Extra client-side slack on top of the server-side long-poll timeout.
const POLL_SLACK: Duration = Duration::from_secs(10);
/// Inline answers may be re-requested almost immediately.
const INLINE_CACHE_TIME: i64 = 1;

/// Hand-rolled Bot API client: long-poll inbound, multipart outbound.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str, poll_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + POLL_SLACK)
            .build()
            .map_err(|e| Error::Transport(format!("couldn't build telegram client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Same as [`Self::method_url`] with the token hidden, for errors and logs.
    fn display_url(&self, method: &str) -> String {
        format!("{}/bot<token>/{}", self.api_base, method)
    }

    /// Send one multipart request and unwrap its envelope.
    pub async fn call(&self, method: &str, fields: FormFields) -> Result<Value> {
        debug!(method, fields = fields.len(), "telegram call");
        let form = fields.into_multipart()?;
        let resp = self
            .http
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                Error::Transport(format!("{} failed: {}", self.display_url(method), e.without_url()))
            })?;
        self.read_envelope(method, resp).await
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut params = vec![("timeout", self.poll_timeout.as_secs().to_string())];
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }
        let resp = self
            .http
            .post(self.method_url("getUpdates"))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                Error::Transport(format!(
                    "{} failed: {}",
                    self.display_url("getUpdates"),
                    e.without_url()
                ))
            })?;
        let result = self.read_envelope("getUpdates", resp).await?;
        decode_result(result)
    }

    pub async fn get_me(&self) -> Result<User> {
        let result = self.call("getMe", FormFields::new()).await?;
        decode_result(result)
    }

    async fn read_envelope(&self, method: &str, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| {
            Error::Transport(format!(
                "couldn't read body of {}: {}",
                self.display_url(method),
                e.without_url()
            ))
        })?;
        parse_envelope(status, &self.display_url(method), &body)
    }
}

/// Unwrap `{ok, result, description}`; non-200 and `ok:false` are failures.
pub fn parse_envelope(status: u16, url: &str, body: &[u8]) -> Result<Value> {
    if status != 200 {
        return Err(Error::Status {
            status,
            url: url.to_string(),
        });
    }
    let envelope: ApiResponse<Value> =
        serde_json::from_slice(body).map_err(|_| Error::Format(url.to_string()))?;
    if !envelope.ok {
        return Err(Error::Telegram(
            envelope
                .description
                .unwrap_or_else(|| "no description".to_string()),
        ));
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}

fn decode_result<T: DeserializeOwned>(result: Value) -> Result<T> {
    serde_json::from_value(result).map_err(|e| Error::Parse(format!("unexpected result shape: {e}")))
}

fn reply_fields(target: ReplyTarget) -> FormFields {
    let mut fields = FormFields::new();
    fields.add_int("chat_id", target.chat_id.0);
    if let Some(reply_to) = target.reply_to {
        fields.add_int("reply_to_message_id", reply_to.0);
    }
    fields
}

/// Bot API method and file field for a media delivery.
pub fn media_method(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Photo => ("sendPhoto", "photo"),
        MediaKind::Document => ("sendDocument", "document"),
        MediaKind::Animation => ("sendAnimation", "animation"),
    }
}

pub fn media_form(target: ReplyTarget, delivery: &Delivery) -> (&'static str, FormFields) {
    let (method, field) = media_method(delivery.kind);
    let mut fields = reply_fields(target);
    match &delivery.source {
        MediaSource::Url(url) => fields.add_text(field, url.as_str()),
        MediaSource::Upload(bytes) => fields.add_file(field, &delivery.filename, bytes.clone()),
    };
    fields.add_text("caption", delivery.caption.as_str());
    (method, fields)
}

pub fn inline_result_json(r: &InlineResult) -> Value {
    match r.kind {
        InlineKind::Photo => json!({
            "type": r.kind.as_str(),
            "id": r.id,
            "photo_url": r.media_url,
            "thumb_url": r.thumb_url,
            "photo_width": r.width,
            "photo_height": r.height,
            "caption": r.caption,
        }),
        InlineKind::Gif => json!({
            "type": r.kind.as_str(),
            "id": r.id,
            "gif_url": r.media_url,
            "thumb_url": r.thumb_url,
            "gif_width": r.width,
            "gif_height": r.height,
            "caption": r.caption,
        }),
    }
}

pub fn inline_form(query_id: &str, results: &[InlineResult]) -> Result<FormFields> {
    let results = Value::Array(results.iter().map(inline_result_json).collect());
    let mut fields = FormFields::new();
    fields.add_text("inline_query_id", query_id);
    fields.add_value("results", &results)?;
    fields.add_int("cache_time", INLINE_CACHE_TIME);
    Ok(fields)
}

#[async_trait]
impl MessagingPort for TelegramClient {
    async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<()> {
        let mut fields = reply_fields(target);
        fields.add_text("text", text);
        self.call("sendMessage", fields).await?;
        Ok(())
    }

    async fn send_chat_action(&self, target: ReplyTarget, action: ChatAction) -> Result<()> {
        let mut fields = FormFields::new();
        fields
            .add_int("chat_id", target.chat_id.0)
            .add_text("action", action.as_str());
        self.call("sendChatAction", fields).await?;
        Ok(())
    }

    async fn send_media(&self, target: ReplyTarget, delivery: &Delivery) -> Result<()> {
        let (method, fields) = media_form(target, delivery);
        self.call(method, fields).await?;
        Ok(())
    }

    async fn answer_inline_query(&self, query_id: &str, results: &[InlineResult]) -> Result<()> {
        self.call("answerInlineQuery", inline_form(query_id, results)?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn poll(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        self.get_updates(offset).await
    }
}
