//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::models::{PaperRecord, SearchFilters, SourceType};
use crate::sources::{SourceAdapter, SourceCapabilities, SourceError};

/// A configurable in-memory source.
///
/// Everything is set up front through the builder methods; the adapter itself
/// is read-only, like the real ones.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    capabilities: SourceCapabilities,
    latency: Duration,
    failure: Option<SourceError>,
    rejects_journal: bool,
    results: Vec<PaperRecord>,
    metadata: HashMap<String, PaperRecord>,
    pdfs: HashMap<String, Vec<u8>>,
    cited_by: HashMap<String, Vec<PaperRecord>>,
    references: HashMap<String, Vec<PaperRecord>>,
    citation_gaps: HashSet<String>,
    recommendations: HashMap<String, Vec<PaperRecord>>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a mock that supports keyword, advanced and metadata lookups
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: SourceCapabilities::SEARCH
                | SourceCapabilities::ADVANCED_SEARCH
                | SourceCapabilities::METADATA,
            latency: Duration::ZERO,
            failure: None,
            rejects_journal: false,
            results: Vec::new(),
            metadata: HashMap::new(),
            pdfs: HashMap::new(),
            cited_by: HashMap::new(),
            references: HashMap::new(),
            citation_gaps: HashSet::new(),
            recommendations: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Records returned by both search methods
    pub fn with_results(mut self, results: Vec<PaperRecord>) -> Self {
        self.results = results;
        self
    }

    /// Delay applied before every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every search and lookup fails with `error`
    pub fn failing(mut self, error: SourceError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn without_advanced_search(mut self) -> Self {
        self.capabilities.remove(SourceCapabilities::ADVANCED_SEARCH);
        self
    }

    /// Advanced searches carrying a journal filter answer `UnsupportedFilter`
    pub fn rejecting_journal(mut self) -> Self {
        self.rejects_journal = true;
        self
    }

    pub fn with_metadata(mut self, record: PaperRecord) -> Self {
        self.metadata.insert(record.identifier.clone(), record);
        self
    }

    pub fn with_pdf(mut self, identifier: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.capabilities |= SourceCapabilities::DOWNLOAD;
        self.pdfs.insert(identifier.into(), bytes);
        self
    }

    /// Enable citation lookups (unknown papers have no neighbors)
    pub fn with_citations(mut self) -> Self {
        self.capabilities |= SourceCapabilities::CITATIONS;
        self
    }

    /// Papers citing `identifier`
    pub fn with_cited_by(mut self, identifier: impl Into<String>, citing: Vec<PaperRecord>) -> Self {
        self.capabilities |= SourceCapabilities::CITATIONS;
        self.cited_by.insert(identifier.into(), citing);
        self
    }

    /// Papers cited by `identifier`
    pub fn with_references(mut self, identifier: impl Into<String>, cited: Vec<PaperRecord>) -> Self {
        self.capabilities |= SourceCapabilities::CITATIONS;
        self.references.insert(identifier.into(), cited);
        self
    }

    /// Citation lookups for `identifier` answer `CitationDataUnavailable`
    pub fn without_citation_data(mut self, identifier: impl Into<String>) -> Self {
        self.citation_gaps.insert(identifier.into());
        self
    }

    /// Provider-side suggestions for `identifier`
    pub fn with_recommendations(mut self, identifier: impl Into<String>, papers: Vec<PaperRecord>) -> Self {
        self.capabilities |= SourceCapabilities::RECOMMENDATIONS;
        self.recommendations.insert(identifier.into(), papers);
        self
    }

    /// Number of adapter calls served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn neighbors(
        &self,
        map: &HashMap<String, Vec<PaperRecord>>,
        identifier: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        if !self.capabilities.contains(SourceCapabilities::CITATIONS)
            || self.citation_gaps.contains(identifier)
        {
            return Err(SourceError::CitationDataUnavailable(identifier.to_string()));
        }
        Ok(map
            .get(identifier)
            .map(|papers| papers.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn search_by_keywords(
        &self,
        _keywords: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.enter().await?;
        Ok(self.results.iter().take(limit).cloned().collect())
    }

    async fn search_advanced(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        if !self.supports_advanced_search() {
            return Err(SourceError::UnsupportedFilter(format!(
                "{} has no field-filtered search",
                self.id
            )));
        }
        if self.rejects_journal && filters.journal.is_some() {
            return Err(SourceError::UnsupportedFilter("journal".to_string()));
        }
        self.enter().await?;
        Ok(self.results.iter().take(limit).cloned().collect())
    }

    async fn get_metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        self.enter().await?;
        self.metadata
            .get(identifier)
            .or_else(|| self.results.iter().find(|p| p.identifier == identifier))
            .cloned()
            .ok_or_else(|| SourceError::NotFound(identifier.to_string()))
    }

    async fn download_pdf(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        self.enter().await?;
        self.pdfs
            .get(identifier)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(identifier.to_string()))
    }

    async fn get_citations(
        &self,
        identifier: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.enter().await?;
        self.neighbors(&self.cited_by, identifier, limit)
    }

    async fn get_references(
        &self,
        identifier: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.enter().await?;
        self.neighbors(&self.references, identifier, limit)
    }

    async fn get_recommendations(
        &self,
        identifier: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.enter().await?;
        if !self.capabilities.contains(SourceCapabilities::RECOMMENDATIONS) {
            return Err(SourceError::NotImplemented("recommendations"));
        }
        Ok(self
            .recommendations
            .get(identifier)
            .map(|papers| papers.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(identifier: &str, title: &str, source: &str) -> PaperRecord {
    PaperRecord::new(
        identifier.to_string(),
        title.to_string(),
        format!("http://example.com/{}", identifier),
        SourceType::from_id(source),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_configured_results() {
        let source = MockSource::new("mock").with_results(vec![
            make_paper("1", "One", "mock"),
            make_paper("2", "Two", "mock"),
        ]);
        let papers = source.search_by_keywords("anything", 1).await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let source = MockSource::new("mock").failing(SourceError::ProviderRateLimited("slow down".into()));
        assert!(matches!(
            source.search_by_keywords("x", 5).await,
            Err(SourceError::ProviderRateLimited(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_citation_gaps() {
        let source = MockSource::new("mock")
            .with_cited_by("a", vec![make_paper("b", "B", "mock")])
            .without_citation_data("c");
        assert_eq!(source.get_citations("a", 10).await.unwrap().len(), 1);
        assert!(source.get_references("a", 10).await.unwrap().is_empty());
        assert!(matches!(
            source.get_citations("c", 10).await,
            Err(SourceError::CitationDataUnavailable(_))
        ));
    }
}
