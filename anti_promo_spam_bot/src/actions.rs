use std::{fmt::Display, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use group_bot_commons::teloxide_retry;
use html_escape::encode_text;
use teloxide::{
    payloads::{RestrictChatMemberSetters, SendMessageSetters},
    prelude::Requester,
    types::{ChatId, ChatPermissions, MessageId, ParseMode, User, UserId},
    ApiError, Bot, RequestError,
};

use crate::{config::Config, types::Verdict};

/// The chat management calls moderation needs.
///
/// Implemented for [`Bot`]; tests use their own fake platform.
pub trait ModerationPlatform {
    fn remove_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Take away the ability to send messages until the given time.
    fn mute_member(
        &self,
        chat: ChatId,
        user: UserId,
        until: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    fn ban_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Send an HTML formatted message.
    fn post_html(
        &self,
        chat: ChatId,
        text: String,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;
}

impl ModerationPlatform for Bot {
    async fn remove_message(&self, chat: ChatId, message: MessageId) -> Result<(), RequestError> {
        teloxide_retry!(self.delete_message(chat, message).await)?;
        Ok(())
    }

    async fn mute_member(
        &self,
        chat: ChatId,
        user: UserId,
        until: DateTime<Utc>,
    ) -> Result<(), RequestError> {
        teloxide_retry!(
            self.restrict_chat_member(chat, user, ChatPermissions::empty())
                .until_date(until)
                .await
        )?;
        Ok(())
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), RequestError> {
        teloxide_retry!(self.ban_chat_member(chat, user).await)?;
        Ok(())
    }

    async fn post_html(&self, chat: ChatId, text: String) -> Result<(), RequestError> {
        teloxide_retry!(
            self.send_message(chat, &text)
                .parse_mode(ParseMode::Html)
                .await
        )?;
        Ok(())
    }
}

/// Who and what to moderate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationTarget {
    pub chat: ChatId,
    pub message: MessageId,
    /// The user to mute. [`None`] if the message was sent on behalf of a chat,
    /// which can't be muted.
    pub user: Option<UserId>,
    /// How to call the sender in the warning. Plain text, not escaped.
    pub display_name: String,
}

/// Knobs of [`moderate`], taken from the [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationSettings {
    pub mute_minutes: u32,
    /// Applies to every single call separately.
    pub action_timeout: Duration,
}

impl From<&Config> for ModerationSettings {
    fn from(config: &Config) -> Self {
        Self {
            mute_minutes: config.mute_minutes(),
            action_timeout: config.action_timeout(),
        }
    }
}

/// How one moderation action went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// Telegram said no. Contains the error text.
    Failed(String),
    TimedOut,
    /// Not attempted, because there was nothing to do it to.
    Skipped,
}

impl ActionOutcome {
    pub fn is_done(&self) -> bool {
        *self == ActionOutcome::Done
    }
}

impl Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionOutcome::Done => write!(f, "done"),
            ActionOutcome::Failed(e) => write!(f, "failed ({e})"),
            ActionOutcome::TimedOut => write!(f, "timed out"),
            ActionOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of [`moderate`], one outcome per action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationReport {
    pub delete: ActionOutcome,
    pub mute: ActionOutcome,
    pub warn: ActionOutcome,
}

impl Display for ModerationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delete: {}, mute: {}, warn: {}",
            self.delete, self.mute, self.warn
        )
    }
}

/// Run one platform call with a timeout, logging how it went.
async fn attempt(
    action: &str,
    target: &ModerationTarget,
    timeout: Duration,
    call: impl Future<Output = Result<(), RequestError>>,
) -> ActionOutcome {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(())) => {
            log::debug!("{action} succeeded in chat {}", target.chat);
            ActionOutcome::Done
        }
        Ok(Err(
            e @ RequestError::Api(ApiError::MessageIdInvalid | ApiError::MessageToDeleteNotFound),
        )) => {
            // Someone else probably has already deleted it.
            log::info!("{action} failed in chat {}: {e}", target.chat);
            ActionOutcome::Failed(e.to_string())
        }
        Ok(Err(e)) => {
            log::warn!("{action} failed in chat {}: {e}", target.chat);
            ActionOutcome::Failed(e.to_string())
        }
        Err(_) => {
            log::warn!(
                "{action} timed out after {:?} in chat {}",
                timeout,
                target.chat
            );
            ActionOutcome::TimedOut
        }
    }
}

/// Text of the warning posted after moderating a spam message. HTML.
#[must_use]
pub fn warning_text(display_name: &str, verdict: Verdict, mute_minutes: u32) -> String {
    format!(
        concat!(
            "⚠️ <b>{}</b> pesan dihapus dan di-mute {} menit!\n",
            "Alasan: {}\n\n",
            "📌 Peraturan grup:\n",
            "• Dilarang promosi grup lain\n",
            "• Dilarang posting link tanpa izin admin\n",
            "• Hormati semua anggota grup",
        ),
        encode_text(display_name),
        mute_minutes,
        verdict.reason().description(),
    )
}

/// Delete the spam message, mute its sender, then post a warning.
///
/// Every step is attempted no matter how the previous ones went, one after
/// another. Nothing here returns an error; the report says what happened.
pub async fn moderate<P: ModerationPlatform>(
    platform: &P,
    target: &ModerationTarget,
    verdict: Verdict,
    settings: ModerationSettings,
) -> ModerationReport {
    log::info!(
        "Moderating message {} from {} in chat {}: {}",
        target.message.0,
        target.display_name,
        target.chat,
        verdict
    );

    let delete = attempt(
        "Deleting a spam message",
        target,
        settings.action_timeout,
        platform.remove_message(target.chat, target.message),
    )
    .await;

    let mute = match target.user {
        Some(user) => {
            let until = Utc::now() + chrono::Duration::minutes(i64::from(settings.mute_minutes));
            attempt(
                "Muting a spammer",
                target,
                settings.action_timeout,
                platform.mute_member(target.chat, user, until),
            )
            .await
        }
        None => ActionOutcome::Skipped,
    };

    // Always goes last, so the group sees something happened even if the above failed.
    let warn = attempt(
        "Posting a spam warning",
        target,
        settings.action_timeout,
        platform.post_html(
            target.chat,
            warning_text(&target.display_name, verdict, settings.mute_minutes),
        ),
    )
    .await;

    ModerationReport { delete, mute, warn }
}

/// Mute a user for the configured time, for the `/mute` command.
pub async fn mute_for<P: ModerationPlatform>(
    platform: &P,
    chat: ChatId,
    user: UserId,
    minutes: u32,
) -> Result<(), RequestError> {
    let until = Utc::now() + chrono::Duration::minutes(i64::from(minutes));
    platform.mute_member(chat, user, until).await
}

/// Text greeting a new member. HTML.
#[must_use]
pub fn welcome_text(display_name: &str) -> String {
    format!(
        concat!(
            "🎉 Selamat datang di grup kami, <b>{}</b>!\n\n",
            "📌 Silakan baca peraturan grup:\n",
            "1. Dilarang spam/promosi tanpa izin admin\n",
            "2. Hormati semua anggota\n",
            "3. Gunakan bahasa yang sopan\n\n",
            "Jika ada pertanyaan, hubungi admin!",
        ),
        encode_text(display_name)
    )
}

/// Greet everyone who isn't a bot. Failures are logged and otherwise ignored.
pub async fn welcome_new_members<P: ModerationPlatform>(platform: &P, chat: ChatId, members: &[User]) {
    for member in members.iter().filter(|m| !m.is_bot) {
        let name = crate::misc::user_display_name(member);
        if let Err(e) = platform.post_html(chat, welcome_text(&name)).await {
            log::warn!("Failed to welcome {name} in chat {chat}: {e}");
        } else {
            log::debug!("Welcomed {name} in chat {chat}");
        }
    }
}
