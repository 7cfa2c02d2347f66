use booru_core::{
    delivery::{caption_line, plan, select},
    messaging::types::ChatAction,
    Result,
};
use tracing::{debug, warn};

use crate::{api::Message, handlers::command_table, router::AppState};

fn greeting(state: &AppState, first_name: &str) -> String {
    let provider = state.search.provider().kind();
    let mut text = format!(
        "Hello, {first_name}! I post images from {}.\n\nCommands:",
        provider.name()
    );
    for (name, _) in command_table(provider) {
        text.push_str(&format!("\n/{name} [tags]"));
    }
    text.push_str("\n\nWithout tags you get a random top scoring image of the last 3 days.");
    text
}

pub(super) async fn handle_hello(state: &AppState, msg: &Message) -> Result<()> {
    let text = greeting(state, msg.sender_first_name());
    state.messenger.send_text(msg.reply_target(), &text).await
}

pub(super) async fn handle_image(
    state: &AppState,
    msg: &Message,
    search: &str,
    limiter: Option<&str>,
    force_random: bool,
) -> Result<()> {
    let target = msg.reply_target();
    // Only a hint for the user; failing to show it is not worth aborting.
    if let Err(e) = state
        .messenger
        .send_chat_action(target, ChatAction::UploadPhoto)
        .await
    {
        warn!(chat_id = target.chat_id.0, "couldn't send chat action: {e}");
    }

    let outcome = state.search.search(search, limiter).await?;
    let empty_search = outcome.was_empty_search();
    let random = force_random || empty_search;

    let entry = {
        let mut rng = rand::thread_rng();
        select(&outcome.entries, random, &mut rng).cloned()
    };
    let Some(entry) = entry else {
        let text = format!(
            "I am sorry, {}, got no images to reply with.",
            msg.sender_first_name()
        );
        return state.messenger.send_text(target, &text).await;
    };

    let provider = state.search.provider();
    let mut delivery = plan(provider.as_ref(), &entry, caption_line(empty_search, random))?;
    if state.cfg.upload_media {
        if let Some(url) = delivery.url().map(str::to_string) {
            let bytes = state.search.fetcher().download(&url).await?;
            delivery = delivery.with_upload(bytes);
        }
    }

    debug!(
        chat_id = target.chat_id.0,
        entry_id = entry.id,
        kind = ?delivery.kind,
        "sending image"
    );
    state.messenger.send_media(target, &delivery).await
}
