use board_block::Settings;
use std::time::Duration;

const DEFAULT_TABLE_NAME: &str = "taskboard";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RETRIES: u32 = 5;
const DEFAULT_PAGE_SIZE: usize = 50;

/// Environment configuration, read once at cold start
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub table_name: String,
    /// API Gateway management endpoint; `None` disables remote pushes
    pub websocket_endpoint: Option<String>,
    pub operation_timeout_ms: u64,
    pub max_contention_retries: u32,
    pub activity_page_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> u64 {
            match lookup(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!("Ignoring invalid {}={}, using {}", key, raw, default);
                    default
                }),
                None => default,
            }
        };

        Self {
            table_name: lookup("TABLE_NAME")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            websocket_endpoint: lookup("WEBSOCKET_ENDPOINT").filter(|s| !s.is_empty()),
            operation_timeout_ms: number("OPERATION_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
            max_contention_retries: number("MAX_CONTENTION_RETRIES", DEFAULT_RETRIES as u64) as u32,
            activity_page_size: number("ACTIVITY_PAGE_SIZE", DEFAULT_PAGE_SIZE as u64) as usize,
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            max_attempts: self.max_contention_retries.max(1),
            activity_page_size: self.activity_page_size.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.table_name, "taskboard");
        assert_eq!(config.websocket_endpoint, None);
        assert_eq!(config.settings().operation_timeout, Duration::from_secs(10));
        assert_eq!(config.settings().max_attempts, 5);
        assert_eq!(config.settings().activity_page_size, 50);
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = config(&[
            ("TABLE_NAME", "boards-prod"),
            ("WEBSOCKET_ENDPOINT", "https://abc.execute-api.ap-southeast-2.amazonaws.com/prod"),
            ("OPERATION_TIMEOUT_MS", "2500"),
            ("MAX_CONTENTION_RETRIES", "lots"),
        ]);
        assert_eq!(config.table_name, "boards-prod");
        assert!(config.websocket_endpoint.is_some());
        assert_eq!(config.operation_timeout_ms, 2500);
        assert_eq!(config.max_contention_retries, 5);
    }
}
