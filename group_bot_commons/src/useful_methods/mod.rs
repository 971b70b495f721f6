use teloxide::types::{Message, MessageEntity, User};

pub trait MessageStuff {
    /// Text of the message, or its caption if it's a media message.
    fn text_full(&self) -> Option<&str>;
    /// Entities belonging to whatever [`MessageStuff::text_full`] returns.
    fn entities_full(&self) -> Option<&[MessageEntity]>;
    /// The user that is actually responsible for this message, if any.
    ///
    /// Messages sent on behalf of a chat or channel carry a placeholder bot
    /// in their `from` field, so this returns [`None`] for those.
    fn human_sender(&self) -> Option<&User>;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }
    fn entities_full(&self) -> Option<&[MessageEntity]> {
        if self.text().is_some() {
            self.entities()
        } else {
            self.caption_entities()
        }
    }
    fn human_sender(&self) -> Option<&User> {
        if self.sender_chat.is_some() {
            return None;
        }
        self.from.as_ref()
    }
}
