use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{errors::Error, provider::ProviderKind, Result};

pub const CONFIG_PATH_ENV: &str = "BOORU_RELAY_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "settings.yaml";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_USER_AGENT: &str =
    "booru-relay/0.1 (Telegram image relay bot; +https://github.com/booru-relay/booru-relay)";

/// Typed configuration for the relay.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub telegram_api_base: String,
    pub poll_timeout: Duration,
    pub poll_backoff: Duration,

    // Image provider
    pub provider: ProviderKind,
    pub provider_key: Option<String>,
    pub provider_base_url: Option<String>,
    pub blocked_tags: Vec<String>,
    pub user_agent: String,
    pub max_requests_per_second: u32,

    // Result cache
    pub cache_ttl: Duration,
    pub cache_capacity: u64,

    // Behavior
    pub upload_media: bool,
    pub owner_contact: Option<String>,
}

/// On-disk shape of `settings.yaml`. Every key is optional here; validation
/// happens in [`Config::from_settings`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    telegram_token: Option<String>,
    /// Older deployments kept a second token for a staging bot.
    telegram_token_test: Option<String>,
    telegram_api_base: Option<String>,
    poll_timeout_secs: Option<u64>,
    poll_backoff_ms: Option<u64>,

    provider: Option<ProviderKind>,
    provider_key: Option<String>,
    derpibooru_key: Option<String>,
    e621_key: Option<String>,
    provider_base_url: Option<String>,
    blocked_tags: Vec<String>,
    user_agent: Option<String>,
    max_requests_per_second: Option<u32>,

    cache_ttl_secs: Option<u64>,
    cache_capacity: Option<u64>,

    upload_media: bool,
    owner_contact: Option<String>,
}

impl Config {
    /// Load `.env`, then the settings file named by `BOORU_RELAY_CONFIG`
    /// (default `settings.yaml`). `TELEGRAM_BOT_TOKEN` overrides the file.
    pub fn load() -> Result<Self> {
        load_dotenv(Path::new(".env"));

        let path = env_path(CONFIG_PATH_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        // A `.env` beside a relocated settings file fills in whatever the
        // working-directory one left unset.
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            load_dotenv(&dir.join(".env"));
        }
        let mut settings = read_settings(&path)?;

        if let Some(token) = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty) {
            settings.telegram_token = Some(token);
        }

        Self::from_settings(settings)
    }

    /// Parse a settings document without consulting the environment.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        Self::from_settings(parse_settings(input)?)
    }

    fn from_settings(s: Settings) -> Result<Self> {
        let telegram_token = s
            .telegram_token
            .and_then(non_empty)
            .or_else(|| s.telegram_token_test.and_then(non_empty))
            .ok_or_else(|| Error::Config("got an empty telegram token".to_string()))?;

        let provider = s.provider.unwrap_or_default();
        let named_key = match provider {
            ProviderKind::Derpibooru => s.derpibooru_key,
            ProviderKind::E621 => s.e621_key,
        };
        let provider_key = s
            .provider_key
            .and_then(non_empty)
            .or_else(|| named_key.and_then(non_empty));
        if provider_key.is_none() && provider == ProviderKind::Derpibooru {
            warn!("no provider_key configured; derpibooru may apply its default filter");
        }

        let max_requests_per_second = match s.max_requests_per_second {
            Some(0) => {
                return Err(Error::Config(
                    "max_requests_per_second must be at least 1".to_string(),
                ))
            }
            Some(n) => n,
            None => provider.default_requests_per_second(),
        };

        let cache_capacity = s.cache_capacity.unwrap_or(100);
        if cache_capacity == 0 {
            return Err(Error::Config("cache_capacity must be at least 1".to_string()));
        }

        let blocked_tags = s
            .blocked_tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Self {
            telegram_token,
            telegram_api_base: s
                .telegram_api_base
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            poll_timeout: Duration::from_secs(s.poll_timeout_secs.unwrap_or(20)),
            poll_backoff: Duration::from_millis(s.poll_backoff_ms.unwrap_or(1000)),
            provider,
            provider_key,
            provider_base_url: s.provider_base_url.and_then(non_empty),
            blocked_tags,
            user_agent: s
                .user_agent
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_requests_per_second,
            cache_ttl: Duration::from_secs(s.cache_ttl_secs.unwrap_or(600)),
            cache_capacity,
            upload_media: s.upload_media,
            owner_contact: s.owner_contact.and_then(non_empty),
        })
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_settings(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no settings file found, relying on environment");
            Ok(Settings::default())
        }
        Err(e) => Err(Error::Config(format!(
            "couldn't read {}: {e}",
            path.display()
        ))),
    }
}

fn parse_settings(input: &str) -> Result<Settings> {
    if input.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(input).map_err(|e| Error::Config(format!("invalid settings: {e}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

/// Export `.env` assignments that are not already set in the environment.
fn load_dotenv(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    let mut loaded = 0usize;
    for (key, value) in parse_dotenv(&contents) {
        if env::var_os(&key).is_none() {
            env::set_var(&key, value);
            loaded += 1;
        }
    }
    info!(path = %path.display(), loaded, "read dotenv file");
}

/// `KEY=value` lines; blank lines, comments and an `export ` prefix are
/// tolerated, and one layer of matching quotes is stripped.
fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let unquoted = ['"', '\'']
                .iter()
                .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
                .unwrap_or(value);
            Some((key.to_string(), unquoted.to_string()))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
