//! The spam checker. Pure and synchronous: no I/O, no state kept between
//! messages, and it never fails. Garbage in gets treated as "not spam".

use std::ops::Range;

use crate::{
    config::Config,
    domain::{CandidateDomain, DomainStatus},
    types::{EntityKind, InboundMessage, ReasonCode, Verdict},
};

mod patterns;

pub use patterns::KNOWN_LINK_HOSTS;

/// Everything a stage may look at.
struct Context<'a> {
    message: &'a InboundMessage,
    text: &'a str,
    lowercase: String,
    /// Distinct keywords found in the lowercased text.
    keyword_count: usize,
    /// Byte ranges of links that get checked as a whole: link-looking text and
    /// URL entities.
    link_spans: Vec<Range<usize>>,
    config: &'a Config,
}

type Stage = fn(&Context) -> Option<ReasonCode>;

/// The checks, strongest signal first. The first one to find something decides
/// the verdict, so the order here is policy and must stay as it is.
const STAGES: &[(&str, Stage)] = &[
    ("entities", check_entities),
    ("suspicious domain in text", check_text_suspicious_domain),
    ("links in text", check_url_like),
    ("bare domains in text", check_bare_domains),
    ("keyword count", check_keyword_threshold),
    ("spam patterns", check_spam_patterns),
];

/// Decide whether this message is spam.
#[must_use]
pub fn classify(message: &InboundMessage, config: &Config) -> Verdict {
    let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) else {
        return Verdict::CLEAN;
    };

    let lowercase = text.to_lowercase();
    let keyword_count = patterns::count_keywords(&lowercase, config.promo_keywords());

    let link_spans = patterns::url_like_spans(text)
        .chain(message.entities.iter().filter_map(|entity| match entity.kind {
            EntityKind::HiddenLink { .. } | EntityKind::VisibleUrl => {
                message.entity_byte_range(entity)
            }
            _ => None,
        }))
        .collect();

    let context = Context {
        message,
        text,
        lowercase,
        keyword_count,
        link_spans,
        config,
    };

    for (name, stage) in STAGES {
        if let Some(reason) = stage(&context) {
            log::debug!("Spam check stage \"{name}\" flagged the message: {reason}");
            return Verdict::from_reason(reason);
        }
    }

    Verdict::CLEAN
}

/// Pick one of the two reasons depending on how the domain fares, or [`None`] if
/// it's allowed.
fn domain_reason(
    domain: &CandidateDomain,
    config: &Config,
    if_suspicious: ReasonCode,
    if_not_allowed: ReasonCode,
) -> Option<ReasonCode> {
    match domain.status(config) {
        DomainStatus::Suspicious => Some(if_suspicious),
        DomainStatus::NotAllowed => Some(if_not_allowed),
        DomainStatus::Allowed => None,
    }
}

fn check_entities(ctx: &Context) -> Option<ReasonCode> {
    use ReasonCode::*;

    for entity in &ctx.message.entities {
        let reason = match &entity.kind {
            EntityKind::HiddenLink { url } => {
                // The reader can't see where this goes, so it's the most
                // sus thing a message can have. Non-web schemes like `tg:` have no
                // domain to allow, so they count as not allowed.
                let domain = CandidateDomain::extract(url.as_str());
                domain_reason(&domain, ctx.config, HiddenLinkSuspicious, HiddenLinkNotAllowed)
                    .or_else(|| {
                        (ctx.keyword_count >= ctx.config.entity_keyword_threshold())
                            .then_some(HiddenLinkWithKeywords)
                    })
            }
            EntityKind::VisibleUrl => {
                let Some(url_text) = ctx.message.entity_text(entity) else {
                    log::debug!("Skipping a URL entity out of text bounds: {entity:?}");
                    continue;
                };
                let domain = CandidateDomain::extract(&url_text);
                domain_reason(&domain, ctx.config, VisibleUrlSuspicious, VisibleUrlNotAllowed)
            }
            EntityKind::Mention => (ctx.keyword_count
                >= ctx.config.entity_keyword_threshold())
            .then_some(MentionWithKeywords),
            EntityKind::Bold | EntityKind::Italic => {
                let Some(formatted) = ctx.message.entity_text(entity) else {
                    continue;
                };
                let formatted = formatted.to_lowercase();
                ctx.config
                    .promo_keywords()
                    .iter()
                    .any(|keyword| formatted.contains(keyword.as_str()))
                    .then_some(FormattedTextKeyword)
            }
            EntityKind::Other => None,
        };

        if reason.is_some() {
            return reason;
        }
    }

    None
}

fn check_text_suspicious_domain(ctx: &Context) -> Option<ReasonCode> {
    ctx.config
        .suspicious_domains()
        .iter()
        .any(|domain| ctx.lowercase.contains(domain.as_str()))
        .then_some(ReasonCode::TextSuspiciousDomain)
}

fn check_url_like(ctx: &Context) -> Option<ReasonCode> {
    patterns::url_like_matches(ctx.text).find_map(|url| {
        domain_reason(
            &CandidateDomain::extract(url),
            ctx.config,
            ReasonCode::VisibleUrlSuspicious,
            ReasonCode::VisibleUrlNotAllowed,
        )
    })
}

fn check_bare_domains(ctx: &Context) -> Option<ReasonCode> {
    patterns::bare_domain_matches(ctx.text, &ctx.link_spans).find_map(|domain| {
        domain_reason(
            &CandidateDomain::extract(domain),
            ctx.config,
            ReasonCode::BareDomainSuspicious,
            ReasonCode::BareDomainNotAllowed,
        )
    })
}

fn check_keyword_threshold(ctx: &Context) -> Option<ReasonCode> {
    (ctx.keyword_count >= ctx.config.keyword_threshold()).then_some(ReasonCode::KeywordThreshold)
}

fn check_spam_patterns(ctx: &Context) -> Option<ReasonCode> {
    ctx.config
        .spam_patterns()
        .iter()
        .any(|pattern| pattern.is_match(&ctx.lowercase))
        .then_some(ReasonCode::PatternMatch)
}
