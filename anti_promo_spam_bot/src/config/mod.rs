use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use teloxide::types::ChatId;

mod store;
mod watcher;

pub use store::ConfigStore;
pub use watcher::watch_config_file;

/// Environment variable that may hold the whole config as JSON.
pub const CONFIG_JSON_VAR: &str = "CONFIG_JSON";
/// Environment variable with a path to the config file.
pub const CONFIG_PATH_VAR: &str = "CONFIG_PATH";
/// Config file used if neither of the above is set.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

pub const DEFAULT_KEYWORD_THRESHOLD: usize = 2;
pub const DEFAULT_ENTITY_KEYWORD_THRESHOLD: usize = 1;
pub const DEFAULT_MUTE_MINUTES: u32 = 10;
/// Telegram treats restrictions shorter than 30 seconds or longer than 366
/// days as forever.
pub const MAX_MUTE_MINUTES: u32 = 366 * 24 * 60;
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse JSON. `origin` is the file path or the variable name it came from.
    ParseJson {
        origin: String,
        source: serde_json::Error,
    },
    /// One of the spam patterns doesn't compile.
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { origin, source } => {
                write!(f, "failed to parse config from {}: {}", origin, source)
            }
            Self::InvalidRegex { pattern, source } => {
                write!(f, "invalid spam pattern '{}': {}", pattern, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
        }
    }
}

/// The config as it's written in JSON.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    promo_keywords: Vec<String>,
    #[serde(default)]
    suspicious_domains: Vec<String>,
    #[serde(default)]
    allowed_domains: Vec<String>,
    #[serde(default)]
    spam_patterns: Vec<String>,
    keyword_threshold: Option<usize>,
    /// Threshold for hidden links and mentions, which are sus on their own.
    entity_keyword_threshold: Option<usize>,
    #[serde(default)]
    allowed_group_ids: Vec<i64>,
    mute_minutes: Option<u32>,
    action_timeout_secs: Option<u64>,
    welcome_new_members: Option<bool>,
}

/// One immutable snapshot of the bot configuration.
///
/// Snapshots are never changed after being handed out. Anything that wants a
/// different config builds a new snapshot, see [`ConfigStore`].
#[derive(Debug, Clone)]
pub struct Config {
    version: u64,
    promo_keywords: Vec<String>,
    suspicious_domains: Vec<String>,
    allowed_domains: Vec<String>,
    spam_patterns: Vec<Regex>,
    keyword_threshold: usize,
    entity_keyword_threshold: usize,
    allowed_group_ids: BTreeSet<i64>,
    mute_minutes: u32,
    action_timeout: Duration,
    welcome_new_members: bool,
}

/// Lowercase, trim, drop empty entries and duplicates. Order is kept.
fn normalize_list(list: Vec<String>) -> Vec<String> {
    let mut output: Vec<String> = Vec::with_capacity(list.len());
    for entry in list {
        let entry = entry.trim().to_lowercase();
        if !entry.is_empty() && !output.contains(&entry) {
            output.push(entry);
        }
    }
    output
}

/// Thresholds of 0 would make every message spam.
fn threshold_at_least_one(name: &str, value: usize) -> usize {
    if value == 0 {
        log::warn!("{name} of 0 makes no sense, using 1 instead.");
        1
    } else {
        value
    }
}

fn mute_minutes_in_range(value: u32) -> u32 {
    let clamped = value.clamp(1, MAX_MUTE_MINUTES);
    if clamped != value {
        log::warn!("muteMinutes of {value} would mute forever, using {clamped} instead.");
    }
    clamped
}

impl Config {
    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let spam_patterns = file
            .spam_patterns
            .into_iter()
            .map(|pattern| {
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidRegex { pattern, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: 0,
            promo_keywords: normalize_list(file.promo_keywords),
            suspicious_domains: normalize_list(file.suspicious_domains),
            allowed_domains: normalize_list(file.allowed_domains),
            spam_patterns,
            keyword_threshold: threshold_at_least_one(
                "keywordThreshold",
                file.keyword_threshold.unwrap_or(DEFAULT_KEYWORD_THRESHOLD),
            ),
            entity_keyword_threshold: threshold_at_least_one(
                "entityKeywordThreshold",
                file.entity_keyword_threshold
                    .unwrap_or(DEFAULT_ENTITY_KEYWORD_THRESHOLD),
            ),
            allowed_group_ids: file.allowed_group_ids.into_iter().collect(),
            mute_minutes: mute_minutes_in_range(
                file.mute_minutes.unwrap_or(DEFAULT_MUTE_MINUTES),
            ),
            action_timeout: Duration::from_secs(
                file.action_timeout_secs
                    .unwrap_or(DEFAULT_ACTION_TIMEOUT_SECS),
            ),
            welcome_new_members: file.welcome_new_members.unwrap_or(true),
        })
    }

    /// Parse a config from a JSON string. Missing fields get their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::from_json_str_with_origin(json, "string")
    }

    fn from_json_str_with_origin(json: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            serde_json::from_str(json).map_err(|source| ConfigError::ParseJson {
                origin: origin.to_string(),
                source,
            })?;
        Self::from_file(file)
    }

    /// Read and parse a config file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str_with_origin(&content, &path.display().to_string())
    }

    /// Version of this snapshot. Every new snapshot published to a
    /// [`ConfigStore`] gets a higher one.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn promo_keywords(&self) -> &[String] {
        &self.promo_keywords
    }
    pub fn suspicious_domains(&self) -> &[String] {
        &self.suspicious_domains
    }
    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }
    pub fn spam_patterns(&self) -> &[Regex] {
        &self.spam_patterns
    }
    pub fn keyword_threshold(&self) -> usize {
        self.keyword_threshold
    }
    pub fn entity_keyword_threshold(&self) -> usize {
        self.entity_keyword_threshold
    }
    pub fn mute_minutes(&self) -> u32 {
        self.mute_minutes
    }
    /// How long a single moderation call to Telegram may take.
    pub fn action_timeout(&self) -> Duration {
        self.action_timeout
    }
    pub fn welcome_new_members(&self) -> bool {
        self.welcome_new_members
    }

    /// Whether the bot should moderate this chat.
    #[must_use]
    pub fn is_group_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed_group_ids.contains(&chat_id.0)
    }

    /// All allowed chats, sorted.
    pub fn allowed_groups(&self) -> impl Iterator<Item = ChatId> + '_ {
        self.allowed_group_ids.iter().copied().map(ChatId)
    }

    /// A copy of this config with the chat added to the allowed chats.
    #[must_use]
    pub fn with_allowed_group(&self, chat_id: ChatId) -> Self {
        let mut new = self.clone();
        new.allowed_group_ids.insert(chat_id.0);
        new
    }

    /// A copy of this config with the chat removed from the allowed chats.
    #[must_use]
    pub fn without_allowed_group(&self, chat_id: ChatId) -> Self {
        let mut new = self.clone();
        new.allowed_group_ids.remove(&chat_id.0);
        new
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
            .expect("Config without spam patterns always compiles")
    }
}

/// Where the config was loaded from on startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// The `CONFIG_JSON` environment variable. Never reloaded.
    Environment,
    /// A file, which is watched for changes.
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str(CONFIG_JSON_VAR),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load the startup config: `CONFIG_JSON` if it's set, otherwise the file at
/// `CONFIG_PATH`, otherwise `config.json`.
pub fn load_startup_config() -> Result<(Config, ConfigSource), ConfigError> {
    if let Some(json) = std::env::var_os(CONFIG_JSON_VAR) {
        let json = json.to_string_lossy();
        log::info!("Loading config from {CONFIG_JSON_VAR}");
        let config = Config::from_json_str_with_origin(&json, CONFIG_JSON_VAR)?;
        return Ok((config, ConfigSource::Environment));
    }

    let path = std::env::var_os(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    log::info!("Loading config from {}", path.display());
    let config = Config::load_file(&path)?;
    Ok((config, ConfigSource::File(path)))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.keyword_threshold(), 2);
        assert_eq!(config.entity_keyword_threshold(), 1);
        assert_eq!(config.mute_minutes(), 10);
        assert_eq!(config.action_timeout(), Duration::from_secs(10));
        assert!(config.welcome_new_members());
        assert!(config.promo_keywords().is_empty());
        assert!(config.spam_patterns().is_empty());
        assert_eq!(config.version(), 0);
    }

    #[test]
    fn original_shape_parses() {
        let config = Config::from_json_str(
            r#"{
                "allowedGroupIds": [-1001234567890],
                "allowedUsernames": ["someadmin"],
                "promoKeywords": ["Promo", " wa ", "promo", ""],
                "suspiciousDomains": ["SCAM.biz"],
                "allowedDomains": ["mygroup.com"],
                "spamPatterns": ["gabung\\s+grup", "(?:modal|deposit)\\s+\\d+"],
                "keywordThreshold": 3
            }"#,
        )
        .unwrap();

        assert_eq!(config.promo_keywords(), ["promo", "wa"]);
        assert_eq!(config.suspicious_domains(), ["scam.biz"]);
        assert_eq!(config.spam_patterns().len(), 2);
        assert!(config.spam_patterns()[0].is_match("GABUNG GRUP sekarang"));
        assert_eq!(config.keyword_threshold(), 3);
        assert!(config.is_group_allowed(ChatId(-1001234567890)));
        assert!(!config.is_group_allowed(ChatId(-1)));
    }

    #[test]
    fn mute_stays_temporary() {
        let config = Config::from_json_str(r#"{ "muteMinutes": 0 }"#).unwrap();
        assert_eq!(config.mute_minutes(), 1);

        let config = Config::from_json_str(r#"{ "muteMinutes": 1000000 }"#).unwrap();
        assert_eq!(config.mute_minutes(), MAX_MUTE_MINUTES);

        let config = Config::from_json_str(r#"{ "muteMinutes": 60 }"#).unwrap();
        assert_eq!(config.mute_minutes(), 60);
    }

    #[test]
    fn zero_threshold_is_raised() {
        let config = Config::from_json_str(r#"{ "keywordThreshold": 0 }"#).unwrap();
        assert_eq!(config.keyword_threshold(), 1);
    }

    #[test]
    fn invalid_regex() {
        let error = Config::from_json_str(r#"{ "spamPatterns": ["(unclosed"] }"#).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidRegex { ref pattern, .. } if pattern == "(unclosed"
        ));
    }

    #[test]
    fn invalid_json() {
        let error = Config::from_json_str(r#"{ "promoKeywords": "promo" }"#).unwrap_err();
        assert!(matches!(error, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn group_mutations_make_copies() {
        let config = Config::from_json_str(r#"{ "allowedGroupIds": [-100] }"#).unwrap();

        let added = config.with_allowed_group(ChatId(-200));
        assert!(added.is_group_allowed(ChatId(-100)));
        assert!(added.is_group_allowed(ChatId(-200)));
        assert!(!config.is_group_allowed(ChatId(-200)));

        let removed = added.without_allowed_group(ChatId(-100));
        assert!(!removed.is_group_allowed(ChatId(-100)));
        assert!(added.is_group_allowed(ChatId(-100)));
        assert_eq!(
            removed.allowed_groups().collect::<Vec<_>>(),
            vec![ChatId(-200)]
        );
    }

    #[test]
    fn loading_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "promoKeywords": ["promo"], "muteMinutes": 5 }}"#).unwrap();

        let config = Config::load_file(file.path()).unwrap();
        assert_eq!(config.promo_keywords(), ["promo"]);
        assert_eq!(config.mute_minutes(), 5);

        let missing = Config::load_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadFile { .. }));
    }
}
