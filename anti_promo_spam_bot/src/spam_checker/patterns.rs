use std::{ops::Range, sync::LazyLock};

use regex::Regex;

/// Short-link and social hosts that people post without a scheme.
pub const KNOWN_LINK_HOSTS: &[&str] = &[
    "bit.ly",
    "t.me",
    "telegram.me",
    "wa.me",
    "chat.whatsapp.com",
    "tinyurl.com",
    "s.id",
    "linktr.ee",
];

/// Top level domains that count for a bare `label.tld` with a single dot.
///
/// With two dots or more any alphabetic TLD counts. A single dot shows up in
/// plenty of normal writing, like `Dr.Budi` or `jam 7.Pagi`.
const SINGLE_DOT_TLDS: &[&str] = &[
    "com", "net", "org", "info", "biz", "io", "co", "id", "me", "ly", "ee", "gg", "cc", "tv",
    "xyz", "top", "site", "online", "club", "shop", "store", "vip", "app", "dev", "link",
    "click", "live", "win", "bet", "fun", "pro", "asia", "icu", "cyou", "buzz", "tk", "ml",
    "ga", "cf", "gq", "pw", "ws", "su", "ru", "cn", "us", "uk", "my", "sg", "ph", "vn", "in",
];

/// Anything that looks like a link: has a scheme, starts with `www.`, or
/// starts with one of [`KNOWN_LINK_HOSTS`] followed by a path.
static URL_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    let hosts = KNOWN_LINK_HOSTS
        .iter()
        .map(|h| regex::escape(h))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i)(?:https?://|www\.)[^\s]+|\b(?:{hosts})/[^\s]*"
    ))
    .expect("Regex will always be valid")
});

/// A bare `label.tld` or `label.label.tld` token, no scheme.
static BARE_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\b")
        .expect("Regex will always be valid")
});

/// All link-looking substrings of the text, in order.
pub fn url_like_matches(text: &str) -> impl Iterator<Item = &str> {
    URL_LIKE.find_iter(text).map(|m| m.as_str())
}

/// Byte ranges of [`url_like_matches`].
pub fn url_like_spans(text: &str) -> impl Iterator<Item = Range<usize>> + '_ {
    URL_LIKE.find_iter(text).map(|m| m.range())
}

fn looks_like_domain(domain: &str) -> bool {
    let mut labels = domain.rsplit('.');
    let tld = labels.next().unwrap_or_default().to_lowercase();
    let dots = labels.count();
    dots > 1 || SINGLE_DOT_TLDS.contains(&tld.as_str())
}

/// All bare domain substrings of the text, in order.
///
/// Ones directly preceded by `@` are skipped, as they're the host part of an
/// email address rather than something people are sent to. So are ones that
/// overlap any of the `already_checked` byte ranges, which are links that were
/// looked at as a whole, paths and all.
pub fn bare_domain_matches<'a>(
    text: &'a str,
    already_checked: &'a [Range<usize>],
) -> impl Iterator<Item = &'a str> {
    BARE_DOMAIN
        .find_iter(text)
        .filter(|m| !text[..m.start()].ends_with('@'))
        .filter(|m| {
            !already_checked
                .iter()
                .any(|span| span.start < m.end() && m.start() < span.end)
        })
        .map(|m| m.as_str())
        .filter(|domain| looks_like_domain(domain))
}

/// How many of the keywords appear in the already lowercased text.
/// Each keyword counts once no matter how often it appears.
pub fn count_keywords(lowercase_text: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|keyword| lowercase_text.contains(keyword.as_str()))
        .count()
}
