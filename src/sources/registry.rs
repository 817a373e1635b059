//! Registry of source adapters, fixed once built.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::ResearchError;

use super::{SourceAdapter, SourceError};

/// Selector that fans a request out to every registered adapter
pub const ALL_SOURCES: &str = "all";

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const ADVANCED_SEARCH = 1 << 1;
        const METADATA = 1 << 2;
        const DOWNLOAD = 1 << 3;
        const CITATIONS = 1 << 4;
        const RECOMMENDATIONS = 1 << 5;
    }
}

/// An adapter together with the capabilities it declared at registration
#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    name: String,
    capabilities: SourceCapabilities,
    adapter: Arc<dyn SourceAdapter>,
}

impl AdapterDescriptor {
    pub fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self {
            name: adapter.id().to_string(),
            capabilities: adapter.capabilities(),
            adapter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    pub fn supports(&self, capability: SourceCapabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn adapter(&self) -> &Arc<dyn SourceAdapter> {
        &self.adapter
    }
}

/// Collects adapters in registration order before freezing them
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<AdapterDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. A second adapter with the same id replaces the
    /// first but keeps its position.
    pub fn register(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        let descriptor = AdapterDescriptor::new(adapter);
        match self.entries.iter_mut().find(|d| d.name == descriptor.name) {
            Some(existing) => {
                tracing::warn!("Source '{}' registered twice, keeping the later one", descriptor.name);
                *existing = descriptor;
            }
            None => self.entries.push(descriptor),
        }
        self
    }

    pub fn build(self) -> AdapterRegistry {
        let index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        AdapterRegistry {
            entries: self.entries,
            index,
        }
    }
}

/// Immutable, ordered map from source name to adapter.
///
/// Shared across requests as `Arc<AdapterRegistry>`; nothing mutates it after
/// [`RegistryBuilder::build`].
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    entries: Vec<AdapterDescriptor>,
    index: HashMap<String, usize>,
}

impl AdapterRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Register the built-in adapters allowed by the config, in the order
    /// pubmed, biorxiv, medrxiv, arxiv, semantic_scholar.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let selection = &config.sources;
        let mut builder = RegistryBuilder::new();

        #[cfg(feature = "source-pubmed")]
        if selection.allows("pubmed") {
            builder = builder.register(Arc::new(super::PubMedSource::new(
                config.api_keys.ncbi.clone(),
            )?));
        }

        #[cfg(feature = "source-biorxiv")]
        for server in [super::ServerType::BioRxiv, super::ServerType::MedRxiv] {
            if selection.allows(server.id()) {
                builder = builder.register(Arc::new(super::BiorxivSource::new(server)?));
            }
        }

        #[cfg(feature = "source-arxiv")]
        if selection.allows("arxiv") {
            builder = builder.register(Arc::new(super::ArxivSource::new()?));
        }

        #[cfg(feature = "source-semantic")]
        if selection.allows("semantic_scholar") {
            builder = builder.register(Arc::new(super::SemanticScholarSource::new(
                config.api_keys.semantic_scholar.clone(),
            )?));
        }

        let registry = builder.build();
        tracing::debug!("Registered sources: {}", registry.names().join(", "));
        Ok(registry)
    }

    /// Turn a selector into the adapters it names: one for a source name,
    /// all of them (in registration order) for [`ALL_SOURCES`].
    pub fn resolve(&self, selector: &str) -> Result<Vec<AdapterDescriptor>, ResearchError> {
        if selector == ALL_SOURCES {
            return Ok(self.entries.clone());
        }
        self.get(selector).map(|d| vec![d.clone()])
    }

    pub fn get(&self, name: &str) -> Result<&AdapterDescriptor, ResearchError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ResearchError::UnknownSource {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|d| d.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdapterDescriptor> {
        self.entries.iter()
    }

    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&AdapterDescriptor> {
        self.entries
            .iter()
            .filter(|d| d.supports(capability))
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    fn registry() -> AdapterRegistry {
        AdapterRegistry::builder()
            .register(Arc::new(MockSource::new("pubmed")))
            .register(Arc::new(MockSource::new("arxiv")))
            .register(Arc::new(MockSource::new("semantic_scholar").with_citations()))
            .build()
    }

    #[test]
    fn test_registry_basic() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert!(registry.has("arxiv"));
        assert!(!registry.has("Arxiv"));
        assert_eq!(registry.names(), vec!["pubmed", "arxiv", "semantic_scholar"]);
    }

    #[test]
    fn test_resolve_all_keeps_registration_order() {
        let names: Vec<String> = registry()
            .resolve(ALL_SOURCES)
            .unwrap()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["pubmed", "arxiv", "semantic_scholar"]);
    }

    #[test]
    fn test_resolve_single() {
        let resolved = registry().resolve("arxiv").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "arxiv");
    }

    #[test]
    fn test_unknown_source_lists_available() {
        match registry().resolve("scopus") {
            Err(ResearchError::UnknownSource { name, available }) => {
                assert_eq!(name, "scopus");
                assert_eq!(available.len(), 3);
            }
            other => panic!("expected UnknownSource, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_registration_replaces_in_place() {
        let registry = AdapterRegistry::builder()
            .register(Arc::new(MockSource::new("a")))
            .register(Arc::new(MockSource::new("b")))
            .register(Arc::new(MockSource::new("a").with_citations()))
            .build();
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry
            .get("a")
            .unwrap()
            .supports(SourceCapabilities::CITATIONS));
    }

    #[test]
    fn test_with_capability() {
        let registry = registry();
        let citing: Vec<&str> = registry
            .with_capability(SourceCapabilities::CITATIONS)
            .iter()
            .map(|d| d.name())
            .collect();
        assert_eq!(citing, vec!["semantic_scholar"]);
    }

    #[cfg(all(
        feature = "source-pubmed",
        feature = "source-biorxiv",
        feature = "source-arxiv",
        feature = "source-semantic"
    ))]
    #[test]
    fn test_from_config_default_order() {
        let registry = AdapterRegistry::from_config(&Config::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec!["pubmed", "biorxiv", "medrxiv", "arxiv", "semantic_scholar"]
        );
    }

    #[cfg(all(feature = "source-arxiv", feature = "source-pubmed"))]
    #[test]
    fn test_from_config_respects_disabled() {
        let mut config = Config::default();
        config.sources.disabled = Some("pubmed".to_string());
        let registry = AdapterRegistry::from_config(&config).unwrap();
        assert!(!registry.has("pubmed"));
        assert!(registry.has("arxiv"));
    }
}
