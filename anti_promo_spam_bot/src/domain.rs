use std::fmt::Display;

use crate::config::Config;

/// Host part of a URL or a bare domain, normalized for comparison against the
/// domain lists in the config.
///
/// This is the only place where such normalization happens. Every domain check
/// must go through it, or the allow and deny lists start disagreeing on what a
/// domain is.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CandidateDomain(String);

/// How a [`CandidateDomain`] fares against the domain lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainStatus {
    /// Contains an entry of the suspicious domain list.
    Suspicious,
    /// Contains no entry of the allowed domain list.
    NotAllowed,
    Allowed,
}

impl CandidateDomain {
    /// Strips the `http://` or `https://` scheme and a `www.` prefix, then cuts off
    /// everything starting with the first `/`. The result is lowercased.
    #[must_use]
    pub fn extract(url_or_domain: &str) -> Self {
        let mut rest = url_or_domain.trim();

        for scheme in ["https://", "http://"] {
            if let Some(prefix) = rest.get(..scheme.len()) {
                if prefix.eq_ignore_ascii_case(scheme) {
                    rest = &rest[scheme.len()..];
                    break;
                }
            }
        }

        // Repeated so that extracting an already extracted domain changes nothing.
        while rest
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("www."))
        {
            rest = &rest[4..];
        }

        let host = rest.split('/').next().unwrap_or_default();

        Self(host.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Check this domain against the suspicious list first, then the allowed list.
    ///
    /// An empty allowed list allows nothing.
    #[must_use]
    pub fn status(&self, config: &Config) -> DomainStatus {
        let domain = self.as_str();

        if config
            .suspicious_domains()
            .iter()
            .any(|suspicious| domain.contains(suspicious.as_str()))
        {
            return DomainStatus::Suspicious;
        }

        if config
            .allowed_domains()
            .iter()
            .any(|allowed| domain.contains(allowed.as_str()))
        {
            DomainStatus::Allowed
        } else {
            DomainStatus::NotAllowed
        }
    }
}

impl AsRef<str> for CandidateDomain {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Display for CandidateDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}
