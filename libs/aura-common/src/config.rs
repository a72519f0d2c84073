// Application configuration, read once at start-up from the environment

use crate::types::DEFAULT_TIME_LIMIT_MS;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub languages_path: PathBuf,
    pub default_time_limit_ms: u64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub hint_cooldown_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            languages_path: PathBuf::from(DEFAULT_LANGUAGES_PATH),
            default_time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            hint_cooldown_secs: 10,
        }
    }
}

impl Config {
    /// Build from process environment, falling back to defaults for anything
    /// unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = lookup("AURA_BIND_ADDR")
            .or_else(|| lookup("PORT").map(|port| format!("0.0.0.0:{}", port)))
            .unwrap_or(defaults.bind_addr);

        Self {
            bind_addr,
            languages_path: lookup("AURA_LANGUAGES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.languages_path),
            default_time_limit_ms: lookup("AURA_DEFAULT_TIME_LIMIT_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.default_time_limit_ms),
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()),
            gemini_model: lookup("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            hint_cooldown_secs: lookup("AURA_HINT_COOLDOWN_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.hint_cooldown_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.default_time_limit_ms, 5000);
        assert_eq!(config.hint_cooldown_secs, 10);
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_port_fallback_and_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("AURA_DEFAULT_TIME_LIMIT_MS", "2500"),
            ("GEMINI_API_KEY", "  "),
            ("AURA_HINT_COOLDOWN_SECS", "not-a-number"),
        ]));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.default_time_limit_ms, 2500);
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.hint_cooldown_secs, 10);
    }

    #[test]
    fn test_zero_default_time_limit_is_ignored() {
        let config = Config::from_lookup(lookup_from(&[("AURA_DEFAULT_TIME_LIMIT_MS", "0")]));
        assert_eq!(config.default_time_limit_ms, 5000);
    }

    #[test]
    fn test_explicit_bind_addr_wins_over_port() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("AURA_BIND_ADDR", "127.0.0.1:7000"),
        ]));
        assert_eq!(config.bind_addr, "127.0.0.1:7000");
    }
}
