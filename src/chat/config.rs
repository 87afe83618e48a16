//! Chat configuration

use crate::{env_parse, ChatYamlConfig};
use std::time::Duration;

/// Default delay before the offline fallback reply is shown
pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_millis(1_000);
/// Default broadcast capacity for consumer updates
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
/// Default text of the offline fallback reply
pub const DEFAULT_FALLBACK_TEXT: &str =
    "The assistant is not reachable right now. Your message was not delivered; please try again in a moment.";

/// Configuration for the consumer-facing chat client
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How long to wait before answering a message that could not be sent
    pub fallback_delay: Duration,
    /// Assistant text used for that answer
    pub fallback_text: String,
    /// Capacity of the update broadcast channel
    pub event_capacity: usize,
}

impl ChatConfig {
    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        Self::resolve(&ChatYamlConfig::default())
    }

    /// Resolve with priority: env var > YAML > default
    pub fn resolve(yaml: &ChatYamlConfig) -> Self {
        Self {
            fallback_delay: env_parse::<u64>("CHAT_FALLBACK_DELAY_MS")
                .or(yaml.fallback_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_FALLBACK_DELAY),
            fallback_text: std::env::var("CHAT_FALLBACK_TEXT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .or_else(|| yaml.fallback_text.clone())
                .unwrap_or_else(|| DEFAULT_FALLBACK_TEXT.to_string()),
            event_capacity: env_parse::<usize>("CHAT_EVENT_CAPACITY")
                .or(yaml.event_capacity)
                .filter(|c| *c > 0)
                .unwrap_or(DEFAULT_EVENT_CAPACITY),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fallback_delay: DEFAULT_FALLBACK_DELAY,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.fallback_delay, Duration::from_millis(1_000));
        assert_eq!(config.event_capacity, 256);
        assert!(!config.fallback_text.is_empty());
    }

    /// Combined env var test to avoid parallel test race conditions.
    #[test]
    fn test_resolve_lifecycle() {
        std::env::remove_var("CHAT_FALLBACK_DELAY_MS");
        std::env::remove_var("CHAT_FALLBACK_TEXT");
        std::env::remove_var("CHAT_EVENT_CAPACITY");

        // Phase 1: YAML beats defaults
        let yaml = ChatYamlConfig {
            fallback_delay_ms: Some(250),
            fallback_text: Some("offline".into()),
            event_capacity: None,
        };
        let config = ChatConfig::resolve(&yaml);
        assert_eq!(config.fallback_delay, Duration::from_millis(250));
        assert_eq!(config.fallback_text, "offline");
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);

        // Phase 2: env beats YAML
        std::env::set_var("CHAT_FALLBACK_DELAY_MS", "50");
        std::env::set_var("CHAT_EVENT_CAPACITY", "8");
        let config = ChatConfig::resolve(&yaml);
        assert_eq!(config.fallback_delay, Duration::from_millis(50));
        assert_eq!(config.event_capacity, 8);

        // Phase 3: invalid values fall back
        std::env::set_var("CHAT_FALLBACK_DELAY_MS", "soon");
        std::env::set_var("CHAT_EVENT_CAPACITY", "0");
        let config = ChatConfig::from_env();
        assert_eq!(config.fallback_delay, DEFAULT_FALLBACK_DELAY);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);

        std::env::remove_var("CHAT_FALLBACK_DELAY_MS");
        std::env::remove_var("CHAT_EVENT_CAPACITY");
    }
}
