use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::github::fetcher::{FetchOptions, DEFAULT_MAX_DELAY_SECONDS, PER_PAGE_MAXIMUM};
use crate::github::rate_limit::{DEFAULT_REMAINING_THRESHOLD, DEFAULT_RESET_PADDING_SECONDS};

/// Configuration file structure for workhist.
///
/// Allows users to save common download settings and reuse them across runs.
/// Configuration files are loaded from the current directory or a specified
/// path; command-line flags override file values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitHub access settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Result persistence settings
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Records requested per page (provider maximum 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Retry budget for each page request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Remaining-quota level that triggers a rate-limit wait
    #[serde(default = "default_rate_limit_threshold")]
    pub rate_limit_threshold: u32,

    /// Seconds slept past the quota reset instant
    #[serde(default = "default_rate_limit_padding")]
    pub rate_limit_padding_seconds: i64,

    /// Ceiling for a single backoff sleep
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory where CSV results are written
    pub results_dir: Option<PathBuf>,

    /// Save per-repository and combined CSV files
    #[serde(default)]
    pub save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github: GitHubConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
            per_page: default_per_page(),
            max_retries: default_max_retries(),
            rate_limit_threshold: default_rate_limit_threshold(),
            rate_limit_padding_seconds: default_rate_limit_padding(),
            max_backoff_seconds: default_max_backoff(),
        }
    }
}

impl GitHubConfig {
    /// Fetch options derived from this configuration, with an optional
    /// command-line retry override.
    pub fn fetch_options(&self, max_retries_override: Option<u32>) -> FetchOptions {
        FetchOptions {
            per_page: self.per_page.min(PER_PAGE_MAXIMUM),
            max_retries: max_retries_override.unwrap_or(self.max_retries),
            base_delay_seconds: 1,
            max_delay_seconds: self.max_backoff_seconds,
            remaining_threshold: self.rate_limit_threshold,
            reset_padding_seconds: self.rate_limit_padding_seconds,
        }
    }
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    PER_PAGE_MAXIMUM
}

fn default_max_retries() -> u32 {
    5
}

fn default_rate_limit_threshold() -> u32 {
    DEFAULT_REMAINING_THRESHOLD
}

fn default_rate_limit_padding() -> i64 {
    DEFAULT_RESET_PADDING_SECONDS
}

fn default_max_backoff() -> u64 {
    DEFAULT_MAX_DELAY_SECONDS
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./workhist.toml
    /// 3. ./workhist.json
    /// 4. ./workhist.yaml
    /// 5. ./workhist.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "workhist.toml",
            "workhist.json",
            "workhist.yaml",
            "workhist.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.github.per_page, 100);
        assert_eq!(config.github.max_retries, 5);
        assert_eq!(config.github.rate_limit_threshold, 10);
        assert!(!config.output.save);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[github]
token = "ghp-test-token"
base-url = "https://github.example.com/api/v3"
max-retries = 2

[output]
results-dir = "/tmp/results"
save = true
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.github.token, Some("ghp-test-token".to_string()));
        assert_eq!(config.github.base_url, "https://github.example.com/api/v3");
        assert_eq!(config.github.max_retries, 2);
        assert_eq!(config.github.per_page, 100);
        assert!(config.output.save);
        assert_eq!(
            config.output.results_dir,
            Some(PathBuf::from("/tmp/results"))
        );
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "github": {
    "token": "ghp-json-token",
    "rate-limit-threshold": 25
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.github.token, Some("ghp-json-token".to_string()));
        assert_eq!(config.github.rate_limit_threshold, 25);
    }

    #[test]
    fn test_load_nonexistent_config_falls_back_to_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.github.base_url, "https://api.github.com");
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workhist.toml");
        let mut config = Config::default();
        config.github.max_retries = 2;
        config.output.save = true;

        config.save(&path).unwrap();
        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.github.max_retries, 2);
        assert!(reloaded.output.save);
    }

    #[test]
    fn test_fetch_options_respects_override_and_page_cap() {
        let mut config = GitHubConfig::default();
        config.per_page = 500;
        config.max_retries = 9;

        let options = config.fetch_options(Some(1));
        assert_eq!(options.per_page, 100);
        assert_eq!(options.max_retries, 1);

        let options = config.fetch_options(None);
        assert_eq!(options.max_retries, 9);
    }
}
