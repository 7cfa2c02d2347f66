//! Update dispatch.
//!
//! Every update runs in its own task; a failing handler only affects that
//! update. Chat messages get an apology on failure, inline queries are only
//! logged.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use booru_core::{domain::ReplyTarget, errors::Error, provider::ProviderKind};

use crate::{
    api::{parse_command, Message, Update},
    router::AppState,
};

mod commands;
mod inline;

/// What a command name resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandHandler {
    Hello,
    Image {
        limiter: Option<&'static str>,
        force_random: bool,
    },
}

const SHARED_COMMANDS: &[(&str, CommandHandler)] = &[
    ("hello", CommandHandler::Hello),
    ("help", CommandHandler::Hello),
    ("start", CommandHandler::Hello),
];

const DERPIBOORU_COMMANDS: &[(&str, CommandHandler)] = &[
    (
        "pony",
        CommandHandler::Image {
            limiter: Some("safe"),
            force_random: false,
        },
    ),
    (
        "randpony",
        CommandHandler::Image {
            limiter: Some("safe"),
            force_random: true,
        },
    ),
    (
        "clop",
        CommandHandler::Image {
            limiter: Some("explicit"),
            force_random: false,
        },
    ),
    (
        "randclop",
        CommandHandler::Image {
            limiter: Some("explicit"),
            force_random: true,
        },
    ),
];

const E621_COMMANDS: &[(&str, CommandHandler)] = &[
    (
        "yiff",
        CommandHandler::Image {
            limiter: None,
            force_random: true,
        },
    ),
    (
        "feral",
        CommandHandler::Image {
            limiter: Some("feral"),
            force_random: true,
        },
    ),
];

/// Static name to handler table for a provider's image commands.
pub fn command_table(kind: ProviderKind) -> &'static [(&'static str, CommandHandler)] {
    match kind {
        ProviderKind::Derpibooru => DERPIBOORU_COMMANDS,
        ProviderKind::E621 => E621_COMMANDS,
    }
}

pub struct Dispatcher {
    state: Arc<AppState>,
    commands: &'static [(&'static str, CommandHandler)],
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>) -> Self {
        let commands = command_table(state.search.provider().kind());
        Self { state, commands }
    }

    pub fn resolve(&self, name: &str) -> Option<CommandHandler> {
        SHARED_COMMANDS
            .iter()
            .chain(self.commands.iter())
            .find(|(n, _)| *n == name)
            .map(|(_, h)| *h)
    }

    /// Handle one update to completion. Never fails; errors are logged and,
    /// for chat messages, reported back to the chat.
    pub async fn handle_update(&self, update: Update) {
        debug!(update_id = update.id, kind = update.kind(), "update");

        if let Some(msg) = &update.message {
            self.handle_message(update.id, msg).await;
        } else if let Some(q) = &update.inline_query {
            if let Err(e) = inline::handle_inline(&self.state, q).await {
                warn!(update_id = update.id, query = %q.query, "inline query failed: {e}");
            }
        }
    }

    async fn handle_message(&self, update_id: i64, msg: &Message) {
        let Some(cmd) = msg.text.as_deref().and_then(parse_command) else {
            return;
        };
        let Some(handler) = self.resolve(&cmd.name) else {
            debug!(update_id, command = %cmd.name, "unknown command");
            return;
        };
        info!(
            update_id,
            chat_id = msg.chat.id,
            user = msg.sender_username(),
            command = %cmd.name,
            argument = %cmd.argument,
            "command"
        );

        let result = match handler {
            CommandHandler::Hello => commands::handle_hello(&self.state, msg).await,
            CommandHandler::Image {
                limiter,
                force_random,
            } => {
                commands::handle_image(&self.state, msg, &cmd.argument, limiter, force_random).await
            }
        };
        if let Err(e) = result {
            let context = format!("couldn't handle /{}", cmd.name);
            reply_error_and_log(&self.state, msg.reply_target(), &context, &e).await;
        }
    }
}

pub fn apology_text(context: &str, err: &Error, owner_contact: Option<&str>) -> String {
    let mut text = format!("Apologies, got error:\n\n{context}: {err}");
    if let Some(owner) = owner_contact {
        text.push_str(&format!("\n\nGo pester {owner} to fix this."));
    }
    text
}

async fn reply_error_and_log(state: &AppState, target: ReplyTarget, context: &str, err: &Error) {
    error!(chat_id = target.chat_id.0, "{context}: {err}");
    let text = apology_text(context, err, state.cfg.owner_contact.as_deref());
    if let Err(e) = state.messenger.send_text(target, &text).await {
        warn!(chat_id = target.chat_id.0, "couldn't send apology: {e}");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::VecDeque, sync::Mutex, time::Duration};

    use async_trait::async_trait;

    use booru_core::{
        cache::ResultCache,
        config::Config,
        delivery::{
            Delivery, MediaKind, MediaSource, CAPTION_BEST, CAPTION_RANDOM, CAPTION_RANDOM_TOP,
        },
        fetcher::{Fetcher, HttpClient, HttpResponse},
        limiter::RateLimiter,
        messaging::{
            port::MessagingPort,
            types::{ChatAction, InlineKind, InlineResult},
        },
        search::SearchClient,
        Result,
    };

    use super::*;
    use crate::api::{Chat, InlineQuery, User};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Sent {
        Text(ReplyTarget, String),
        Action(ReplyTarget, ChatAction),
        Media(ReplyTarget, Delivery),
        Inline(String, Vec<InlineResult>),
    }

    #[derive(Default)]
    pub(crate) struct RecordingMessenger {
        sent: Mutex<Vec<Sent>>,
        fail_media: bool,
    }

    impl RecordingMessenger {
        pub(crate) fn failing_media() -> Self {
            Self {
                fail_media: true,
                ..Self::default()
            }
        }

        pub(crate) fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for RecordingMessenger {
        async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Text(target, text.to_string()));
            Ok(())
        }

        async fn send_chat_action(&self, target: ReplyTarget, action: ChatAction) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Action(target, action));
            Ok(())
        }

        async fn send_media(&self, target: ReplyTarget, delivery: &Delivery) -> Result<()> {
            if self.fail_media {
                return Err(Error::Telegram("Bad Request: wrong file identifier".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Media(target, delivery.clone()));
            Ok(())
        }

        async fn answer_inline_query(&self, query_id: &str, results: &[InlineResult]) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Inline(query_id.to_string(), results.to_vec()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct ScriptedHttp {
        responses: Mutex<VecDeque<HttpResponse>>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedHttp {
        pub(crate) fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn get(&self, url: &str) -> Result<HttpResponse> {
            self.urls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Transport("connection refused".to_string()))
        }
    }

    pub(crate) struct Harness {
        pub(crate) dispatcher: Dispatcher,
        pub(crate) messenger: Arc<RecordingMessenger>,
        pub(crate) http: Arc<ScriptedHttp>,
    }

    pub(crate) fn harness(
        settings: &str,
        messenger: RecordingMessenger,
        responses: Vec<(u16, Vec<u8>)>,
    ) -> Harness {
        let cfg = Arc::new(Config::from_yaml_str(settings).unwrap());
        let http = Arc::new(ScriptedHttp::default());
        http.responses.lock().unwrap().extend(
            responses
                .into_iter()
                .map(|(status, body)| HttpResponse { status, body }),
        );
        let fetcher = Arc::new(Fetcher::new(
            http.clone(),
            Arc::new(RateLimiter::per_second(100)),
            Arc::new(ResultCache::new(100, Duration::from_secs(600))),
        ));
        let provider = cfg.provider.build(None, None).unwrap();
        let search = Arc::new(SearchClient::new(provider, fetcher, cfg.blocked_tags.clone()));
        let messenger = Arc::new(messenger);
        let state = Arc::new(AppState {
            cfg,
            search,
            messenger: messenger.clone(),
        });
        Harness {
            dispatcher: Dispatcher::new(state),
            messenger,
            http,
        }
    }

    pub(crate) const DERPI_SETTINGS: &str =
        "telegram_token: t\nblocked_tags: [gore]\nowner_contact: '@owner'\n";

    pub(crate) fn test_dispatcher(
        messenger: RecordingMessenger,
        responses: Vec<(u16, Vec<u8>)>,
    ) -> (Dispatcher, Arc<RecordingMessenger>) {
        let h = harness(DERPI_SETTINGS, messenger, responses);
        (h.dispatcher, h.messenger)
    }

    fn json_body(v: serde_json::Value) -> Vec<u8> {
        v.to_string().into_bytes()
    }

    pub(crate) fn images(ids_scores: &[(i64, i64)]) -> Vec<u8> {
        let images: Vec<_> = ids_scores
            .iter()
            .map(|(id, score)| {
                serde_json::json!({
                    "id": id,
                    "score": score,
                    "format": "png",
                    "representations": {
                        "tall": format!("//derpicdn.net/img/{id}/tall.png"),
                        "thumb": format!("//derpicdn.net/img/{id}/thumb.png")
                    }
                })
            })
            .collect();
        json_body(serde_json::json!({ "images": images }))
    }

    pub(crate) fn message(id: i64, text: &str) -> Update {
        Update {
            id,
            message: Some(Message {
                message_id: 50 + id,
                from: Some(User {
                    id: 7,
                    is_bot: false,
                    first_name: "Twilight".to_string(),
                    last_name: None,
                    username: Some("twi".to_string()),
                }),
                date: 1_700_000_000,
                chat: Chat {
                    id: -100,
                    kind: Some("group".to_string()),
                    title: None,
                    username: None,
                },
                text: Some(text.to_string()),
            }),
            inline_query: None,
        }
    }

    fn inline(id: i64, query: &str) -> Update {
        Update {
            id,
            message: None,
            inline_query: Some(InlineQuery {
                id: format!("q{id}"),
                from: User {
                    id: 8,
                    is_bot: false,
                    first_name: "Rarity".to_string(),
                    last_name: None,
                    username: None,
                },
                query: query.to_string(),
                offset: String::new(),
            }),
        }
    }

    pub(crate) fn target(update_id: i64) -> ReplyTarget {
        ReplyTarget::new(
            booru_core::domain::ChatId(-100),
            Some(booru_core::domain::MessageId(50 + update_id)),
        )
    }

    #[test]
    fn resolves_static_command_table() {
        let (d, _) = test_dispatcher(RecordingMessenger::default(), vec![]);
        assert_eq!(d.resolve("help"), Some(CommandHandler::Hello));
        assert_eq!(
            d.resolve("randclop"),
            Some(CommandHandler::Image {
                limiter: Some("explicit"),
                force_random: true
            })
        );
        assert_eq!(d.resolve("yiff"), None);

        let h = harness("telegram_token: t\nprovider: e621\n", RecordingMessenger::default(), vec![]);
        assert_eq!(
            h.dispatcher.resolve("feral"),
            Some(CommandHandler::Image {
                limiter: Some("feral"),
                force_random: true
            })
        );
        assert_eq!(h.dispatcher.resolve("pony"), None);
    }

    #[tokio::test]
    async fn pony_with_tags_replies_with_top_photo() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::default(),
            vec![(200, images(&[(1, 5), (2, 50), (3, 10)]))],
        );
        h.dispatcher.handle_update(message(1, "/pony celestia")).await;

        let url = &h.http.urls()[0];
        assert!(url.contains("q=-gore%2C+celestia%2C+safe"), "{url}");

        let sent = h.messenger.sent();
        assert_eq!(sent[0], Sent::Action(target(1), ChatAction::UploadPhoto));
        assert_eq!(
            sent[1],
            Sent::Media(
                target(1),
                Delivery {
                    kind: MediaKind::Photo,
                    source: MediaSource::Url("https://derpicdn.net/img/2/tall.png".to_string()),
                    filename: "2.png".to_string(),
                    caption: format!("https://derpibooru.org/2\n{CAPTION_BEST}"),
                }
            )
        );
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn empty_search_picks_a_random_recent_top_image() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::default(),
            vec![(200, images(&[(1, 5), (2, 50)]))],
        );
        h.dispatcher.handle_update(message(2, "/pony")).await;

        let url = &h.http.urls()[0];
        assert!(url.contains("sf=score") && url.contains("sd=desc"));
        assert!(url.contains("created_at.gt%3A"));

        match &h.messenger.sent()[1] {
            Sent::Media(_, d) => assert!(d.caption.ends_with(CAPTION_RANDOM_TOP)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn random_command_with_tags_uses_random_caption() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::default(),
            vec![(200, images(&[(1, 5)]))],
        );
        h.dispatcher.handle_update(message(3, "/randclop luna")).await;

        assert!(h.http.urls()[0].contains("explicit"));
        match &h.messenger.sent()[1] {
            Sent::Media(_, d) => assert!(d.caption.ends_with(CAPTION_RANDOM)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_results_is_a_polite_reply() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::default(),
            vec![(200, images(&[]))],
        );
        h.dispatcher.handle_update(message(4, "/pony nothing")).await;

        assert_eq!(
            h.messenger.sent()[1],
            Sent::Text(
                target(4),
                "I am sorry, Twilight, got no images to reply with.".to_string()
            )
        );
    }

    #[tokio::test]
    async fn provider_failure_is_apologized_for() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::default(),
            vec![(500, b"oops".to_vec())],
        );
        h.dispatcher.handle_update(message(5, "/pony celestia")).await;

        let sent = h.messenger.sent();
        let Sent::Text(t, text) = &sent[1] else {
            panic!("expected apology, got {sent:?}");
        };
        assert_eq!(*t, target(5));
        assert!(text.starts_with("Apologies, got error:\n\ncouldn't handle /pony: "));
        assert!(text.contains("unexpected status code 500"));
        assert!(text.ends_with("\n\nGo pester @owner to fix this."));
    }

    #[tokio::test]
    async fn failed_send_is_apologized_for() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::failing_media(),
            vec![(200, images(&[(1, 5)]))],
        );
        h.dispatcher.handle_update(message(6, "/pony celestia")).await;

        let sent = h.messenger.sent();
        assert!(matches!(&sent[1], Sent::Text(_, t) if t.contains("wrong file identifier")));
    }

    #[tokio::test]
    async fn unknown_commands_and_plain_text_are_ignored() {
        let h = harness(DERPI_SETTINGS, RecordingMessenger::default(), vec![]);
        h.dispatcher.handle_update(message(7, "/frobnicate x")).await;
        h.dispatcher.handle_update(message(8, "just chatting")).await;

        assert!(h.messenger.sent().is_empty());
        assert!(h.http.urls().is_empty());
    }

    #[tokio::test]
    async fn hello_lists_commands() {
        let h = harness(DERPI_SETTINGS, RecordingMessenger::default(), vec![]);
        h.dispatcher.handle_update(message(9, "/start")).await;

        let sent = h.messenger.sent();
        let Sent::Text(_, text) = &sent[0] else {
            panic!("expected greeting, got {sent:?}");
        };
        assert!(text.contains("Twilight"));
        assert!(text.contains("/pony"));
        assert!(text.contains("/randclop"));
    }

    #[tokio::test]
    async fn upload_media_sends_downloaded_bytes() {
        let h = harness(
            "telegram_token: t\nupload_media: true\n",
            RecordingMessenger::default(),
            vec![(200, images(&[(1, 5)])), (200, b"\x89PNG".to_vec())],
        );
        h.dispatcher.handle_update(message(10, "/pony celestia")).await;

        assert_eq!(h.http.urls()[1], "https://derpicdn.net/img/1/tall.png");
        match &h.messenger.sent()[1] {
            Sent::Media(_, d) => {
                assert_eq!(d.source, MediaSource::Upload(b"\x89PNG".to_vec()));
                assert_eq!(d.filename, "1.png");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn inline_query_is_answered_with_results() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::default(),
            vec![(200, images(&[(1, 5), (2, 9)]))],
        );
        h.dispatcher
            .handle_update(inline(11, "celestia, suggestive"))
            .await;

        let url = &h.http.urls()[0];
        assert!(url.contains("suggestive"));
        assert!(!url.contains("%2C+safe"));

        let sent = h.messenger.sent();
        let Sent::Inline(id, results) = &sent[0] else {
            panic!("expected inline answer, got {sent:?}");
        };
        assert_eq!(id, "q11");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "2");
        assert_eq!(results[0].kind, InlineKind::Photo);
        assert_eq!(results[0].caption, "https://derpibooru.org/2");
    }

    #[tokio::test]
    async fn inline_failures_are_only_logged() {
        let h = harness(
            DERPI_SETTINGS,
            RecordingMessenger::default(),
            vec![(500, b"oops".to_vec())],
        );
        h.dispatcher.handle_update(inline(12, "celestia")).await;
        assert!(h.messenger.sent().is_empty());
    }

    #[test]
    fn apology_without_owner_contact() {
        let err = Error::Parse("response has no \"images\" field".to_string());
        assert_eq!(
            apology_text("couldn't handle /pony", &err, None),
            "Apologies, got error:\n\ncouldn't handle /pony: parse error: response has no \"images\" field"
        );
    }
}
