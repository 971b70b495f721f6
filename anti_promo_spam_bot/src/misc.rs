use group_bot_commons::useful_methods::MessageStuff;
use teloxide::{
    prelude::Requester,
    types::{Chat, Message, MessageEntity, MessageEntityKind, User},
    Bot, RequestError,
};

use crate::{
    actions::ModerationTarget,
    types::{EntityKind, InboundEntity, InboundMessage},
};

/// `@username` if the user has one, otherwise `User_<id>`.
#[must_use]
pub fn user_display_name(user: &User) -> String {
    match &user.username {
        Some(username) => format!("@{username}"),
        None => format!("User_{}", user.id),
    }
}

/// `@username` of the chat, or its title.
#[must_use]
pub fn chat_display_name(chat: &Chat) -> String {
    if let Some(username) = chat.username() {
        format!("@{username}")
    } else if let Some(title) = chat.title() {
        title.to_string()
    } else {
        // Shouldn't happen, but eh.
        format!("Chat_{}", chat.id)
    }
}

/// How to call whoever sent this message.
#[must_use]
pub fn sender_display_name(message: &Message) -> String {
    if let Some(chat) = &message.sender_chat {
        chat_display_name(chat)
    } else if let Some(user) = &message.from {
        user_display_name(user)
    } else {
        // Shouldn't happen either, but eh.
        "a private sender".to_string()
    }
}

fn entity_kind(kind: &MessageEntityKind) -> EntityKind {
    match kind {
        MessageEntityKind::TextLink { url } => EntityKind::HiddenLink { url: url.clone() },
        MessageEntityKind::Url => EntityKind::VisibleUrl,
        MessageEntityKind::Mention | MessageEntityKind::TextMention { .. } => EntityKind::Mention,
        MessageEntityKind::Bold => EntityKind::Bold,
        MessageEntityKind::Italic => EntityKind::Italic,
        _ => EntityKind::Other,
    }
}

fn inbound_entity(entity: &MessageEntity) -> InboundEntity {
    InboundEntity::new(entity_kind(&entity.kind), entity.offset, entity.length)
}

/// The part of a message the spam checker looks at: its text or caption, and
/// the entities that go with it.
#[must_use]
pub fn inbound_from_message(message: &Message) -> InboundMessage {
    InboundMessage {
        text: message.text_full().map(ToOwned::to_owned),
        entities: message
            .entities_full()
            .unwrap_or_default()
            .iter()
            .map(inbound_entity)
            .collect(),
    }
}

/// What [`crate::actions::moderate`] should act on for this message.
#[must_use]
pub fn moderation_target(message: &Message) -> ModerationTarget {
    ModerationTarget {
        chat: message.chat.id,
        message: message.id,
        user: message.human_sender().map(|u| u.id),
        display_name: sender_display_name(message),
    }
}

/// Whether whoever sent this message gets to run the chat.
/// Private chats with the bot always count.
pub async fn is_sender_admin(bot: &Bot, message: &Message) -> Result<bool, RequestError> {
    if message.chat.is_private() {
        return Ok(true);
    }

    match (&message.sender_chat, &message.from) {
        // Anonymous admins post as the group itself.
        (Some(sender_chat), _) if sender_chat.id == message.chat.id => Ok(true),
        // Only the linked channel's owners can post as it.
        (Some(sender_chat), _) => {
            let group = bot.get_chat(message.chat.id).await?;
            Ok(group.linked_chat_id() == Some(sender_chat.id.0))
        }
        (None, Some(user)) => {
            let member = bot.get_chat_member(message.chat.id, user.id).await?;
            Ok(member.kind.is_privileged())
        }
        (None, None) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn user(username: Option<&str>) -> User {
        let mut json = serde_json::json!({
            "id": 1234,
            "is_bot": false,
            "first_name": "Budi",
        });
        if let Some(username) = username {
            json["username"] = username.into();
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn display_names() {
        assert_eq!(user_display_name(&user(Some("budi_trader"))), "@budi_trader");
        assert_eq!(user_display_name(&user(None)), "User_1234");
    }

    #[test]
    fn entity_kinds() {
        let url = Url::parse("https://scam.biz/ea").unwrap();
        assert_eq!(
            entity_kind(&MessageEntityKind::TextLink { url: url.clone() }),
            EntityKind::HiddenLink { url }
        );
        assert_eq!(entity_kind(&MessageEntityKind::Url), EntityKind::VisibleUrl);
        assert_eq!(
            entity_kind(&MessageEntityKind::TextMention { user: user(None) }),
            EntityKind::Mention
        );
        assert_eq!(entity_kind(&MessageEntityKind::Italic), EntityKind::Italic);
        assert_eq!(entity_kind(&MessageEntityKind::Hashtag), EntityKind::Other);
    }

    #[test]
    fn entity_positions_carry_over() {
        let entity = MessageEntity::bold(3, 5);
        assert_eq!(inbound_entity(&entity), InboundEntity::new(EntityKind::Bold, 3, 5));
    }

    #[test]
    fn message_conversion() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "message_id": 7,
            "date": 1700000000,
            "chat": { "id": -1001, "type": "supergroup", "title": "Trading" },
            "from": { "id": 1234, "is_bot": false, "first_name": "Budi" },
            "text": "promo klik",
            "entities": [
                { "type": "text_link", "offset": 6, "length": 4, "url": "https://scam.biz/" }
            ]
        }))
        .unwrap();

        let inbound = inbound_from_message(&message);
        assert_eq!(inbound.text.as_deref(), Some("promo klik"));
        assert_eq!(inbound.entities.len(), 1);
        assert!(matches!(inbound.entities[0].kind, EntityKind::HiddenLink { .. }));
        assert_eq!(inbound.entity_text(&inbound.entities[0]).as_deref(), Some("klik"));

        let target = moderation_target(&message);
        assert_eq!(target.chat.0, -1001);
        assert_eq!(target.message.0, 7);
        assert_eq!(target.user.map(|u| u.0), Some(1234));
        assert_eq!(target.display_name, "User_1234");
    }
}
