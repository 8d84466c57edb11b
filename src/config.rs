use serde::Deserialize;
use std::path::Path;

use crate::models::DEFAULT_SOURCE_ID;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// NewsAPI key, may be left empty and supplied through `NEWSAPI_KEY`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upstream rejects more than 20 sources per search
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub failed_page_policy: FailedPagePolicy,
    #[serde(default = "default_sources")]
    pub default_sources: Vec<String>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// What a failed "load more" does to the end-of-results flag.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailedPagePolicy {
    /// Leave paging open; the next call retries the same page
    #[default]
    Retry,
    /// Treat the failure as the end of results until the next fresh search
    StopPaging,
}

fn default_base_url() -> String {
    "https://newsapi.org/v2".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_max_sources() -> usize {
    20
}

fn default_request_timeout() -> u64 {
    30
}

fn default_sources() -> Vec<String> {
    vec![DEFAULT_SOURCE_ID.to_string()]
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            page_size: default_page_size(),
            max_sources: default_max_sources(),
            request_timeout: default_request_timeout(),
            failed_page_policy: FailedPagePolicy::default(),
            default_sources: default_sources(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be positive");
        }
        if self.max_sources == 0 {
            anyhow::bail!("max_sources must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::from_str("").unwrap();

        assert!(config.api_key.is_empty());
        assert_eq!(config.base_url, "https://newsapi.org/v2");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_sources, 20);
        assert_eq!(config.request_timeout, 30);
        assert_eq!(config.failed_page_policy, FailedPagePolicy::Retry);
        assert_eq!(config.default_sources, vec!["abc-news".to_string()]);
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            api_key = "secret"
            base_url = "http://localhost:8080/v2"
            page_size = 10
            request_timeout = 5
            failed_page_policy = "stop_paging"
            default_sources = ["bbc-news", "cnn"]
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.base_url, "http://localhost:8080/v2");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.max_sources, 20);
        assert_eq!(config.request_timeout, 5);
        assert_eq!(config.failed_page_policy, FailedPagePolicy::StopPaging);
        assert_eq!(config.default_sources, vec!["bbc-news", "cnn"]);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = Config::from_str(r#"failed_page_policy = "give_up""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result = Config::from_str("page_size = 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_max_sources_rejected() {
        let result = Config::from_str("max_sources = 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_default_sources() {
        let config = Config::from_str("default_sources = []").unwrap();
        assert!(config.default_sources.is_empty());
    }

    #[test]
    fn test_default_impl_matches_empty_file() {
        let parsed = Config::from_str("").unwrap();
        let built = Config::default();

        assert_eq!(parsed.base_url, built.base_url);
        assert_eq!(parsed.page_size, built.page_size);
        assert_eq!(parsed.default_sources, built.default_sources);
        assert_eq!(parsed.listen_addr, built.listen_addr);
    }
}
