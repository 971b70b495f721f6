use std::sync::Arc;

use group_bot_commons::useful_methods::MessageStuff;
use teloxide::{prelude::*, types::Me, RequestError};

use crate::{
    actions::{moderate, welcome_new_members, ModerationSettings},
    config::{Config, ConfigStore},
    misc::{inbound_from_message, is_sender_admin, moderation_target},
    spam_checker::classify,
    types::Verdict,
};

mod commands;
pub use commands::generate_bot_commands;

/// Handles both new and edited messages.
pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    config_store: Arc<ConfigStore>,
) -> Result<(), RequestError> {
    if message.human_sender().is_some_and(|user| user.is_bot) {
        return Ok(());
    }

    if message.chat.is_private() {
        return handle_private_message(bot, message).await;
    }

    // One snapshot for the whole message.
    let config = config_store.current();

    if let Some(members) = message.new_chat_members() {
        if config.welcome_new_members() && config.is_group_allowed(message.chat.id) {
            welcome_new_members(&bot, message.chat.id, members).await;
        }
        return Ok(());
    }

    // Commands are checked too, so spam can't ride along after one.
    if check_for_spam(&bot, &message, &config).await {
        return Ok(());
    }

    commands::handle_command(&bot, &me, &message, &config_store).await?;

    Ok(())
}

/// Verdict for a message that the spam checker flags, if it's in a group the
/// bot watches.
fn spam_verdict(message: &Message, config: &Config) -> Option<Verdict> {
    if !config.is_group_allowed(message.chat.id) {
        log::debug!("Skipping spam check in chat {}, it's not allowed.", message.chat.id);
        return None;
    }

    let verdict = classify(&inbound_from_message(message), config);
    verdict.is_spam().then_some(verdict)
}

/// Moderate the message if it's spam and not from an admin.
/// Returns `true` if it was moderated.
async fn check_for_spam(bot: &Bot, message: &Message, config: &Config) -> bool {
    let Some(verdict) = spam_verdict(message, config) else {
        return false;
    };

    // Admin status costs a request, so it's only asked for spam.
    let is_admin = match is_sender_admin(bot, message).await {
        Ok(is_admin) => is_admin,
        Err(e) => {
            log::warn!("Failed to check if the sender is an admin, assuming not: {e}");
            false
        }
    };

    if is_admin {
        log::debug!("Letting a message from an admin through ({verdict}).");
        return false;
    }

    let report = moderate(
        bot,
        &moderation_target(message),
        verdict,
        ModerationSettings::from(config),
    )
    .await;

    log::info!(
        "Moderated message {} in chat {} (config version {}): {report}",
        message.id.0,
        message.chat.id,
        config.version()
    );

    true
}

pub async fn handle_private_message(bot: Bot, message: Message) -> Result<(), RequestError> {
    bot.send_message(
        message.chat.id,
        "
Bot ini menjaga grup trading dari spam dan promosi.

Tambahkan bot ke grup sebagai admin dengan izin \"Hapus pesan\" dan \"Batasi anggota\", lalu kirim /allowgroup di grup tersebut.

Pesan spam akan dihapus, pengirimnya di-mute sementara, dan peringatan akan dikirim ke grup.",
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReasonCode;

    fn config() -> Config {
        Config::from_json_str(
            r#"{
                "allowedGroupIds": [-1001],
                "promoKeywords": ["promo", "wa"],
                "allowedDomains": ["mygroup.com"],
                "suspiciousDomains": ["scam.biz"]
            }"#,
        )
        .unwrap()
    }

    fn group_message(chat_id: i64, text: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 7,
            "date": 1700000000,
            "chat": { "id": chat_id, "type": "supergroup", "title": "Trading" },
            "from": { "id": 1234, "is_bot": false, "first_name": "Budi" },
            "text": text,
        }))
        .unwrap()
    }

    #[test]
    fn commands_do_not_hide_spam() {
        let config = config();

        for text in [
            "/help join promo wa https://scam.biz",
            "/ban promo wa",
            "/promo wa sekarang",
        ] {
            let verdict = spam_verdict(&group_message(-1001, text), &config);
            assert!(verdict.is_some(), "{text}");
        }

        let message = group_message(-1001, "/help join promo wa https://tokoku.id/");
        let verdict = spam_verdict(&message, &config);
        assert_eq!(verdict.map(|v| v.reason()), Some(ReasonCode::VisibleUrlNotAllowed));
    }

    #[test]
    fn plain_commands_go_through() {
        let config = config();
        assert!(spam_verdict(&group_message(-1001, "/help"), &config).is_none());
        assert!(spam_verdict(&group_message(-1001, "/removegroup -1002"), &config).is_none());
    }

    #[test]
    fn other_groups_are_not_checked() {
        let config = config();
        assert!(spam_verdict(&group_message(-1002, "promo wa https://scam.biz"), &config).is_none());
    }
}
