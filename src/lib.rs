//! Chat Stream
//!
//! Client side of a streaming chat session with an AI assistant:
//! - JSON wire codec for the chat socket
//! - Connection manager with exponential-backoff reconnects
//! - Turn accumulation of streamed tokens and UI components
//! - Conversation id tracking across reconnects
//! - A broadcast bridge for the UI layer

pub mod backoff;
pub mod chat;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod events;
pub mod protocol;

use anyhow::Result;
use backoff::BackoffPolicy;
use chat::ChatConfig;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub use chat::{ChatClient, Message, SendOutcome, Sender};
pub use connection::{ConnectionManager, ConnectionState, WsConnector};
pub use credentials::{CredentialSource, EnvCredential, StaticCredential};
pub use error::ChatError;
pub use events::ChatUpdate;

/// Path of the chat socket on the assistant host
pub const STREAM_PATH: &str = "/api/WebSocket/ChatStreamSocket/Get";
/// Host used when nothing is configured
pub const DEFAULT_HOST: &str = "localhost";

/// Read and parse an env var, ignoring unset or unparsable values
pub(crate) fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "Ignoring unparsable env var");
            None
        }
    }
}

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub connection: ConnectionYamlConfig,
    pub chat: ChatYamlConfig,
}

/// Connection section; absent keys fall back to env vars or defaults
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConnectionYamlConfig {
    pub url: Option<String>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_cap_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Chat configuration section (YAML only — ChatConfig in chat/config.rs handles full setup)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChatYamlConfig {
    pub fallback_delay_ms: Option<u64>,
    pub fallback_text: Option<String>,
    pub event_capacity: Option<usize>,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat socket URL (`ws://` or `wss://`)
    pub url: String,
    pub backoff: BackoffPolicy,
    pub chat: ChatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: Self::stream_url_for_host(DEFAULT_HOST),
            backoff: BackoffPolicy::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);
        let defaults = BackoffPolicy::default();

        let url = std::env::var("CHAT_STREAM_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or(yaml.connection.url)
            .unwrap_or_else(|| Self::stream_url_for_host(DEFAULT_HOST));

        let base_delay = env_parse::<u64>("CHAT_BACKOFF_BASE_MS")
            .or(yaml.connection.backoff_base_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay);
        let max_delay = env_parse::<u64>("CHAT_BACKOFF_CAP_MS")
            .or(yaml.connection.backoff_cap_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay);
        let max_attempts = env_parse::<u32>("CHAT_MAX_ATTEMPTS")
            .or(yaml.connection.max_attempts)
            .unwrap_or(defaults.max_attempts);

        let config = Self {
            url,
            backoff: BackoffPolicy::new(base_delay, max_delay, max_attempts),
            chat: ChatConfig::resolve(&yaml.chat),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise only fail at connect time.
    ///
    /// Run again after applying overrides from outside the config file.
    pub fn validate(&self) -> error::Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ChatError::Config(format!(
                "chat stream URL must use ws:// or wss://, got {}",
                self.url
            )));
        }
        if self.backoff.max_delay < self.backoff.base_delay {
            return Err(ChatError::Config(format!(
                "backoff cap ({}ms) is smaller than backoff base ({}ms)",
                self.backoff.max_delay.as_millis(),
                self.backoff.base_delay.as_millis()
            )));
        }
        Ok(())
    }

    /// Chat socket URL on `host`
    pub fn stream_url_for_host(host: &str) -> String {
        format!("wss://{}{}", host.trim_end_matches('/'), STREAM_PATH)
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
connection:
  url: wss://chat.example.com/api/WebSocket/ChatStreamSocket/Get
  backoff_base_ms: 500
  max_attempts: 3

chat:
  fallback_delay_ms: 2000
  fallback_text: "Offline"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.connection.url.as_deref(),
            Some("wss://chat.example.com/api/WebSocket/ChatStreamSocket/Get")
        );
        assert_eq!(config.connection.backoff_base_ms, Some(500));
        assert_eq!(config.connection.backoff_cap_ms, None);
        assert_eq!(config.connection.max_attempts, Some(3));
        assert_eq!(config.chat.fallback_delay_ms, Some(2000));
        assert_eq!(config.chat.fallback_text.as_deref(), Some("Offline"));
        assert_eq!(config.chat.event_capacity, None);
    }

    #[test]
    fn test_yaml_sections_optional() {
        let config: YamlConfig = serde_yaml::from_str("chat:\n  event_capacity: 8\n").unwrap();
        assert!(config.connection.url.is_none());
        assert_eq!(config.chat.event_capacity, Some(8));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(
            config.url,
            "wss://localhost/api/WebSocket/ChatStreamSocket/Get"
        );
        assert_eq!(config.backoff, BackoffPolicy::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            url: "https://chat.example.com/socket".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ChatError::Config(msg)) if msg.contains("https://")));

        let mut config = Config::default();
        config.backoff.max_delay = Duration::from_millis(10);
        assert!(matches!(config.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_stream_url_for_host() {
        assert_eq!(
            Config::stream_url_for_host("chat.example.com"),
            "wss://chat.example.com/api/WebSocket/ChatStreamSocket/Get"
        );
        assert_eq!(
            Config::stream_url_for_host("chat.example.com/"),
            "wss://chat.example.com/api/WebSocket/ChatStreamSocket/Get"
        );
    }

    /// Combined test for YAML file loading, env var overrides and validation.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "CHAT_STREAM_URL",
                "CHAT_BACKOFF_BASE_MS",
                "CHAT_BACKOFF_CAP_MS",
                "CHAT_MAX_ATTEMPTS",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
connection:
  url: ws://yaml-host:9000/api/WebSocket/ChatStreamSocket/Get
  backoff_base_ms: 200
  backoff_cap_ms: 3000
  max_attempts: 4
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(
            config.url,
            "ws://yaml-host:9000/api/WebSocket/ChatStreamSocket/Get"
        );
        assert_eq!(config.backoff.base_delay, Duration::from_millis(200));
        assert_eq!(config.backoff.max_delay, Duration::from_millis(3000));
        assert_eq!(config.backoff.max_attempts, 4);

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("CHAT_STREAM_URL", "wss://env-host/api/WebSocket/ChatStreamSocket/Get");
        std::env::set_var("CHAT_MAX_ATTEMPTS", "7");
        std::env::set_var("CHAT_BACKOFF_BASE_MS", "not-a-number");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.url, "wss://env-host/api/WebSocket/ChatStreamSocket/Get");
        assert_eq!(config.backoff.max_attempts, 7);
        // unparsable env var falls through to YAML
        assert_eq!(config.backoff.base_delay, Duration::from_millis(200));

        // --- Phase 3: invalid values are rejected ---
        std::env::set_var("CHAT_STREAM_URL", "https://env-host/chat");
        assert!(Config::from_yaml_and_env(Some(&file_path)).is_err());
        std::env::remove_var("CHAT_STREAM_URL");

        std::env::set_var("CHAT_BACKOFF_CAP_MS", "50");
        assert!(Config::from_yaml_and_env(Some(&file_path)).is_err());

        clear_env();

        // --- Phase 4: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-chat-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.url, Config::default().url);
        assert_eq!(config.backoff, BackoffPolicy::default());

        // --- Phase 5: Unparsable YAML → defaults ---
        std::fs::write(&file_path, "connection: [not, a, map").unwrap();
        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.backoff, BackoffPolicy::default());
    }
}
