use std::fmt::Write;

use group_bot_commons::useful_methods::MessageStuff;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    sugar::request::RequestReplyExt,
    types::{BotCommand, Me, ParseMode},
    RequestError,
};

use crate::{
    actions::{mute_for, ModerationPlatform},
    config::ConfigStore,
    misc::{is_sender_admin, user_display_name},
};

const HELP_TEXT: &str = "📋 Panduan Bot:

🔧 Perintah Admin:
/mute - Balas pesan user untuk mute sementara
/ban - Balas pesan user untuk ban
/allowgroup - Tambah grup saat ini ke daftar izin
/removegroup &lt;group_id&gt; - Hapus grup dari daftar izin
/listgroups - Lihat daftar grup yang diizinkan
/groupid - Tampilkan ID grup saat ini

🛡️ Fitur Otomatis:
- Hapus spam/promosi/link dan mute pengirimnya
- Welcome member baru";

enum Command {
    Help,
    GroupId,
    AllowGroup,
    RemoveGroup,
    ListGroups,
    Mute,
    Ban,
}

impl Command {
    const ALL: [Self; 7] = [
        Self::Help,
        Self::GroupId,
        Self::AllowGroup,
        Self::RemoveGroup,
        Self::ListGroups,
        Self::Mute,
        Self::Ban,
    ];

    fn parse(command: &str) -> Option<Self> {
        Some(match command {
            "/start" | "/help" => Self::Help,
            "/groupid" => Self::GroupId,
            "/allowgroup" => Self::AllowGroup,
            "/removegroup" => Self::RemoveGroup,
            "/listgroups" => Self::ListGroups,
            "/mute" => Self::Mute,
            "/ban" => Self::Ban,
            _ => return None,
        })
    }

    /// Name without the slash, as Telegram wants it in the command menu.
    fn callname(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::GroupId => "groupid",
            Self::AllowGroup => "allowgroup",
            Self::RemoveGroup => "removegroup",
            Self::ListGroups => "listgroups",
            Self::Mute => "mute",
            Self::Ban => "ban",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Help => "Panduan bot",
            Self::GroupId => "Tampilkan ID grup saat ini",
            Self::AllowGroup => "Tambah grup saat ini ke daftar izin",
            Self::RemoveGroup => "Hapus grup dari daftar izin",
            Self::ListGroups => "Lihat daftar grup yang diizinkan",
            Self::Mute => "Balas pesan user untuk mute sementara",
            Self::Ban => "Balas pesan user untuk ban",
        }
    }

    fn admin_only(&self) -> bool {
        !matches!(self, Self::Help | Self::GroupId)
    }
}

pub fn generate_bot_commands() -> Vec<BotCommand> {
    Command::ALL
        .iter()
        .map(|command| BotCommand::new(command.callname(), command.description()))
        .collect()
}

async fn reply(bot: &Bot, message: &Message, text: &str) -> Result<(), RequestError> {
    bot.send_message(message.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_to(message.id)
        .await?;
    Ok(())
}

/// Split `/command@botname params` into the lowercased command without the
/// mention, and the trimmed rest. [`None`] if the text isn't a command.
fn split_command<'a>(text: &'a str, bot_username: &str) -> Option<(String, &'a str)> {
    if !text.starts_with('/') {
        return None;
    }

    let (head, params) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let mention = format!("@{bot_username}");
    let name = head.strip_suffix(mention.as_str()).unwrap_or(head);

    Some((name.to_lowercase(), params.trim()))
}

/// Respond to one of our commands. Anything else is left alone.
pub async fn handle_command(
    bot: &Bot,
    me: &Me,
    message: &Message,
    config_store: &ConfigStore,
) -> Result<(), RequestError> {
    let Some((name, params)) = message
        .text()
        .and_then(|text| split_command(text, me.username()))
    else {
        return Ok(());
    };

    let Some(command) = Command::parse(&name) else {
        return Ok(());
    };

    if command.admin_only() && !is_sender_admin(bot, message).await? {
        reply(bot, message, "⛔ Perintah ini hanya untuk admin.").await?;
        return Ok(());
    }

    let chat_id = message.chat.id;

    match command {
        Command::Help => reply(bot, message, HELP_TEXT).await?,
        Command::GroupId => {
            reply(bot, message, &format!("🆔 ID grup ini: <code>{chat_id}</code>")).await?
        }
        Command::AllowGroup => {
            let config = config_store.update(|c| c.with_allowed_group(chat_id));
            log::info!("Chat {chat_id} allowed, config version {}", config.version());
            reply(bot, message, "✅ Grup ini ditambahkan ke daftar izin.").await?;
        }
        Command::RemoveGroup => {
            let Ok(group_id) = params.parse::<i64>() else {
                reply(bot, message, "⚠️ Format: /removegroup &lt;group_id&gt;").await?;
                return Ok(());
            };
            let group = ChatId(group_id);

            if !config_store.current().is_group_allowed(group) {
                reply(bot, message, "⚠️ Grup itu tidak ada di daftar izin.").await?;
                return Ok(());
            }

            let config = config_store.update(|c| c.without_allowed_group(group));
            log::info!("Chat {group} removed, config version {}", config.version());
            reply(
                bot,
                message,
                &format!("🗑 Grup <code>{group}</code> dihapus dari daftar izin."),
            )
            .await?;
        }
        Command::ListGroups => {
            let config = config_store.current();
            let mut list = String::from("📋 Grup yang diizinkan:");
            let mut any = false;
            for group in config.allowed_groups() {
                any = true;
                write!(list, "\n• <code>{group}</code>").expect("Writing to a String never fails");
            }
            if !any {
                list = String::from("📭 Belum ada grup yang diizinkan.");
            }
            reply(bot, message, &list).await?;
        }
        Command::Mute | Command::Ban => {
            let Some(target) = message.reply_to_message().and_then(|m| m.human_sender()) else {
                reply(bot, message, "⚠️ Balas pesan user yang ingin ditindak.").await?;
                return Ok(());
            };
            let name = html_escape::encode_text(&user_display_name(target)).into_owned();

            let (result, done_text) = if let Command::Mute = command {
                let minutes = config_store.current().mute_minutes();
                (
                    mute_for(bot, chat_id, target.id, minutes).await,
                    format!("🔇 {name} di-mute {minutes} menit."),
                )
            } else {
                (
                    bot.ban_member(chat_id, target.id).await,
                    format!("🚫 {name} di-ban dari grup."),
                )
            };

            match result {
                Ok(()) => reply(bot, message, &done_text).await?,
                Err(e) => {
                    log::warn!("Admin command failed in chat {chat_id}: {e}");
                    reply(
                        bot,
                        message,
                        "⚠️ Gagal. Pastikan bot adalah admin dengan izin membatasi anggota.",
                    )
                    .await?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing() {
        assert!(matches!(Command::parse("/start"), Some(Command::Help)));
        assert!(matches!(Command::parse("/listgroups"), Some(Command::ListGroups)));
        assert!(Command::parse("/promo").is_none());

        assert!(!Command::Help.admin_only());
        assert!(!Command::GroupId.admin_only());
        assert!(Command::Ban.admin_only());
        assert!(Command::AllowGroup.admin_only());
    }

    #[test]
    fn command_splitting() {
        assert_eq!(
            split_command("/RemoveGroup@promo_guard_bot  -1001 ", "promo_guard_bot"),
            Some(("/removegroup".to_string(), "-1001"))
        );
        assert_eq!(split_command("/help", "promo_guard_bot"), Some(("/help".to_string(), "")));
        // Addressed to some other bot, so it doesn't parse as ours.
        let (name, _) = split_command("/help@other_bot", "promo_guard_bot").unwrap();
        assert!(Command::parse(&name).is_none());
        assert_eq!(split_command("halo /help", "promo_guard_bot"), None);
    }

    #[test]
    fn bot_commands_round_trip_through_the_parser() {
        let commands = generate_bot_commands();
        assert_eq!(commands.len(), Command::ALL.len());

        for command in commands {
            assert!(!command.command.starts_with('/'));
            assert!(Command::parse(&format!("/{}", command.command)).is_some());
        }
    }
}
