//! Configuration file discovery and writing.
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! source_timeout_secs = 30
//! default_limit = 10
//! max_limit = 100
//! relax_unsupported_filters = true
//!
//! [citations]
//! default_source = "semantic_scholar"
//! default_depth = 2
//! per_node_limit = 20
//! max_nodes = 500
//! max_concurrent_requests = 10
//!
//! [api_keys]
//! semantic_scholar = "your-api-key"
//! ncbi = "your-ncbi-key"
//!
//! [sources]
//! enabled = "pubmed,arxiv,semantic_scholar"
//! disabled = ""
//!
//! [downloads]
//! default_path = "./downloads"
//! organize_by_source = true
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

const LOCAL_CONFIG: &str = "research-atlas.toml";

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// `<config_dir>/research-atlas/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("research-atlas").join("config.toml"))
}

/// First existing config file: `./research-atlas.toml`, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|p| p.is_file())
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigFileError> {
        toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api_keys.semantic_scholar = Some("saved-key".to_string());
        config.search.source_timeout_secs = 12;
        config.sources.enabled = Some("arxiv".to_string());

        config.save(&path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(
            loaded.api_keys.semantic_scholar,
            Some("saved-key".to_string())
        );
        assert_eq!(loaded.search.source_timeout_secs, 12);
        assert!(!loaded.sources.allows("pubmed"));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");

        std::fs::write(&path, "invalid = toml = content").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_to_toml_has_sections() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[search]"));
        assert!(rendered.contains("source_timeout_secs = 30"));
        assert!(rendered.contains("[citations]"));
    }
}
