//! Configuration management.
//!
//! Values come from, in increasing priority: built-in defaults, a TOML file,
//! and `RESEARCH_ATLAS__<SECTION>__<KEY>` environment variables.

mod file_config;

pub use file_config::{default_config_path, find_config_file, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "RESEARCH_ATLAS";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub citations: CitationConfig,

    /// API keys for various services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Which compiled-in sources get registered
    #[serde(default)]
    pub sources: SourceSelection,

    #[serde(default)]
    pub downloads: DownloadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Per-source deadline for one search unit
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,

    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound on the per-source limit a caller may ask for
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Retry once without the journal filter when a source rejects it
    #[serde(default = "default_true")]
    pub relax_unsupported_filters: bool,
}

impl SearchConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            relax_unsupported_filters: true,
        }
    }
}

fn default_source_timeout() -> u64 {
    30
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

fn default_true() -> bool {
    true
}

/// Citation-graph settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    /// Source used when a citation request names none
    #[serde(default = "default_citation_source")]
    pub default_source: String,

    #[serde(default = "default_depth")]
    pub default_depth: u8,

    /// Neighbors requested per node and direction
    #[serde(default = "default_per_node_limit")]
    pub per_node_limit: usize,

    /// Discovery stops once the graph holds this many nodes
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Concurrent provider calls within one frontier
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            default_source: default_citation_source(),
            default_depth: default_depth(),
            per_node_limit: default_per_node_limit(),
            max_nodes: default_max_nodes(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

fn default_citation_source() -> String {
    "semantic_scholar".to_string()
}

fn default_depth() -> u8 {
    2
}

fn default_per_node_limit() -> usize {
    20
}

fn default_max_nodes() -> usize {
    500
}

fn default_max_concurrent() -> usize {
    10
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default)]
    pub semantic_scholar: Option<String>,

    /// NCBI E-utilities key (optional, raises the PubMed rate limit)
    #[serde(default)]
    pub ncbi: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            semantic_scholar: std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
            ncbi: std::env::var("NCBI_API_KEY").ok(),
        }
    }
}

/// Comma-separated allow/deny lists of source ids
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSelection {
    /// Only these sources, when set
    #[serde(default)]
    pub enabled: Option<String>,

    /// Never these sources; wins over `enabled`
    #[serde(default)]
    pub disabled: Option<String>,
}

impl SourceSelection {
    pub fn allows(&self, id: &str) -> bool {
        let listed = |list: &Option<String>| {
            list.as_deref()
                .map(|l| l.split(',').any(|s| s.trim().eq_ignore_ascii_case(id)))
        };

        if listed(&self.disabled) == Some(true) {
            return false;
        }
        match &self.enabled {
            Some(list) if !list.trim().is_empty() => listed(&self.enabled) == Some(true),
            _ => true,
        }
    }
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default download directory
    #[serde(default = "default_download_dir")]
    pub default_path: PathBuf,

    /// Whether to create subdirectories per source
    #[serde(default = "default_true")]
    pub organize_by_source: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_path: default_download_dir(),
            organize_by_source: true,
        }
    }
}

impl DownloadConfig {
    /// Where a PDF for `identifier` from `source` is written
    pub fn target_path(&self, source: &str, identifier: &str) -> PathBuf {
        let file_name: String = identifier
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let dir = if self.organize_by_source {
            self.default_path.join(source)
        } else {
            self.default_path.clone()
        };
        dir.join(format!("{file_name}.pdf"))
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "json" switches the subscriber to JSON lines
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file plus environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    build(Some(path))
}

/// Load from the discovered config file if there is one, else defaults plus
/// environment overrides
pub fn get_config() -> Result<Config, config::ConfigError> {
    match find_config_file() {
        Some(path) => {
            tracing::debug!("Using config file {}", path.display());
            build(Some(&path))
        }
        None => build(None),
    }
}

fn build(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.source_timeout(), Duration::from_secs(30));
        assert!(config.search.relax_unsupported_filters);
        assert_eq!(config.citations.default_source, "semantic_scholar");
        assert_eq!(config.citations.default_depth, 2);
        assert!(config.downloads.organize_by_source);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[search]
source_timeout_secs = 5
default_limit = 25

[citations]
max_nodes = 50

[sources]
disabled = "medrxiv"

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.search.source_timeout_secs, 5);
        assert_eq!(config.search.default_limit, 25);
        assert_eq!(config.search.max_limit, 100);
        assert_eq!(config.citations.max_nodes, 50);
        assert_eq!(config.citations.per_node_limit, 20);
        assert!(!config.sources.allows("medrxiv"));
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(load_config(Path::new("/nonexistent/research-atlas.toml")).is_err());
    }

    #[test]
    fn test_source_selection() {
        let everything = SourceSelection::default();
        assert!(everything.allows("pubmed"));

        let only = SourceSelection {
            enabled: Some("arxiv, pubmed".into()),
            disabled: None,
        };
        assert!(only.allows("pubmed"));
        assert!(!only.allows("biorxiv"));

        let both = SourceSelection {
            enabled: Some("arxiv,pubmed".into()),
            disabled: Some("pubmed".into()),
        };
        assert!(!both.allows("pubmed"));
        assert!(both.allows("arxiv"));
    }

    #[test]
    fn test_download_target_path() {
        let downloads = DownloadConfig {
            default_path: PathBuf::from("/tmp/papers"),
            organize_by_source: true,
        };
        assert_eq!(
            downloads.target_path("biorxiv", "10.1101/2024.01.01.123"),
            PathBuf::from("/tmp/papers/biorxiv/10.1101_2024.01.01.123.pdf")
        );
    }
}
