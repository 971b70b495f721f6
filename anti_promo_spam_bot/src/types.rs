use std::{fmt::Display, ops::Range};

use url::Url;

/// What a [`InboundEntity`] marks in the message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// Text that links somewhere other than what it says.
    HiddenLink { url: Url },
    /// A URL typed out in the text itself.
    VisibleUrl,
    /// A mention of a user, by username or otherwise.
    Mention,
    Bold,
    Italic,
    /// Anything the spam checker doesn't care about.
    Other,
}

/// A span of message text with some meaning attached to it.
///
/// `offset` and `length` are in UTF-16 code units, same as Telegram reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEntity {
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

impl InboundEntity {
    pub fn new(kind: EntityKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
        }
    }
}

/// A message stripped down to what the spam checker looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Text of the message, or its caption.
    pub text: Option<String>,
    /// Entities of the text, in the order they were received.
    pub entities: Vec<InboundEntity>,
}

impl InboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            entities: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_entity(mut self, entity: InboundEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Returns the piece of text this entity covers.
    ///
    /// Returns [`None`] if the entity points outside of the text, or if it splits
    /// a character in half.
    pub fn entity_text(&self, entity: &InboundEntity) -> Option<String> {
        let range = self.entity_byte_range(entity)?;
        Some(self.text.as_deref()?[range].to_string())
    }

    /// Byte range of the text this entity covers, with the same [`None`] cases
    /// as [`InboundMessage::entity_text`].
    pub fn entity_byte_range(&self, entity: &InboundEntity) -> Option<Range<usize>> {
        let text = self.text.as_deref()?;
        let end = entity.offset.checked_add(entity.length)?;

        // UTF-16 offset to byte offset, only if it lands on a char boundary.
        let byte_at = |target: usize| {
            let mut units = 0;
            for (byte, c) in text.char_indices() {
                if units == target {
                    return Some(byte);
                }
                if units > target {
                    return None;
                }
                units += c.len_utf16();
            }
            (units == target).then_some(text.len())
        };

        Some(byte_at(entity.offset)?..byte_at(end)?)
    }
}

/// Why a message was or wasn't considered spam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    HiddenLinkSuspicious,
    HiddenLinkNotAllowed,
    HiddenLinkWithKeywords,
    VisibleUrlSuspicious,
    VisibleUrlNotAllowed,
    MentionWithKeywords,
    FormattedTextKeyword,
    TextSuspiciousDomain,
    BareDomainSuspicious,
    BareDomainNotAllowed,
    KeywordThreshold,
    PatternMatch,
    Clean,
}

impl ReasonCode {
    /// Stable name of this reason, as it appears in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HiddenLinkSuspicious => "HIDDEN_LINK_SUSPICIOUS",
            Self::HiddenLinkNotAllowed => "HIDDEN_LINK_NOT_ALLOWED",
            Self::HiddenLinkWithKeywords => "HIDDEN_LINK_WITH_KEYWORDS",
            Self::VisibleUrlSuspicious => "VISIBLE_URL_SUSPICIOUS",
            Self::VisibleUrlNotAllowed => "VISIBLE_URL_NOT_ALLOWED",
            Self::MentionWithKeywords => "MENTION_WITH_KEYWORDS",
            Self::FormattedTextKeyword => "FORMATTED_TEXT_KEYWORD",
            Self::TextSuspiciousDomain => "TEXT_SUSPICIOUS_DOMAIN",
            Self::BareDomainSuspicious => "BARE_DOMAIN_SUSPICIOUS",
            Self::BareDomainNotAllowed => "BARE_DOMAIN_NOT_ALLOWED",
            Self::KeywordThreshold => "KEYWORD_THRESHOLD",
            Self::PatternMatch => "PATTERN_MATCH",
            Self::Clean => "CLEAN",
        }
    }

    /// Short explanation shown to the group in the warning post.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::HiddenLinkSuspicious => "link tersembunyi ke situs mencurigakan",
            Self::HiddenLinkNotAllowed => "link tersembunyi ke situs yang tidak diizinkan",
            Self::HiddenLinkWithKeywords => "link tersembunyi dengan kata-kata promosi",
            Self::VisibleUrlSuspicious | Self::BareDomainSuspicious => {
                "link ke situs mencurigakan"
            }
            Self::VisibleUrlNotAllowed | Self::BareDomainNotAllowed => {
                "link tanpa izin admin"
            }
            Self::MentionWithKeywords => "promosi akun atau grup lain",
            Self::FormattedTextKeyword | Self::KeywordThreshold | Self::PatternMatch => {
                "mengandung promosi/spam"
            }
            Self::TextSuspiciousDomain => "menyebut situs mencurigakan",
            Self::Clean => "tidak ada",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The spam checker's judgement on one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    is_spam: bool,
    reason: ReasonCode,
}

impl Verdict {
    /// Not spam.
    pub const CLEAN: Verdict = Verdict {
        is_spam: false,
        reason: ReasonCode::Clean,
    };

    /// A verdict for the given reason. Only [`ReasonCode::Clean`] is not spam.
    #[must_use]
    pub fn from_reason(reason: ReasonCode) -> Self {
        Self {
            is_spam: reason != ReasonCode::Clean,
            reason,
        }
    }

    #[must_use]
    pub fn is_spam(&self) -> bool {
        self.is_spam
    }

    #[must_use]
    pub fn reason(&self) -> ReasonCode {
        self.reason
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.is_spam {
            true => write!(f, "spam ({})", self.reason),
            false => write!(f, "not spam"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_text_in_utf16_units() {
        // The emoji takes two UTF-16 code units.
        let message = InboundMessage::new("🔥 PROMO hari ini");

        let entity = InboundEntity::new(EntityKind::Bold, 3, 5);
        assert_eq!(message.entity_text(&entity).as_deref(), Some("PROMO"));

        let whole = InboundEntity::new(EntityKind::Italic, 0, 17);
        assert_eq!(
            message.entity_text(&whole).as_deref(),
            Some("🔥 PROMO hari ini")
        );
    }

    #[test]
    fn entity_byte_ranges() {
        let message = InboundMessage::new("🔥 cek mygroup.com");

        let url = InboundEntity::new(EntityKind::VisibleUrl, 7, 11);
        assert_eq!(message.entity_byte_range(&url), Some(9..20));

        let inside_emoji = InboundEntity::new(EntityKind::Bold, 1, 2);
        assert_eq!(message.entity_byte_range(&inside_emoji), None);
    }

    #[test]
    fn entity_text_out_of_bounds() {
        let message = InboundMessage::new("hello");

        let past_end = InboundEntity::new(EntityKind::Bold, 3, 10);
        assert_eq!(message.entity_text(&past_end), None);

        let overflowing = InboundEntity::new(EntityKind::Bold, usize::MAX, 2);
        assert_eq!(message.entity_text(&overflowing), None);

        let no_text = InboundMessage::default();
        assert_eq!(no_text.entity_text(&past_end), None);
    }

    #[test]
    fn entity_text_split_surrogate() {
        let message = InboundMessage::new("🔥");
        let half = InboundEntity::new(EntityKind::Bold, 0, 1);
        assert_eq!(message.entity_text(&half), None);
    }

    #[test]
    fn only_clean_is_not_spam() {
        assert!(!Verdict::from_reason(ReasonCode::Clean).is_spam());
        assert_eq!(Verdict::from_reason(ReasonCode::Clean), Verdict::CLEAN);
        assert!(Verdict::from_reason(ReasonCode::PatternMatch).is_spam());
        assert_eq!(
            Verdict::from_reason(ReasonCode::KeywordThreshold).to_string(),
            "spam (KEYWORD_THRESHOLD)"
        );
    }
}
