//! Paper record model shared by every source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::parse_flexible_date;

/// The source/repository where the paper was found
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    PubMed,
    BioRxiv,
    MedRxiv,
    Arxiv,
    SemanticScholar,
    Other(String),
}

impl SourceType {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            SourceType::PubMed => "PubMed",
            SourceType::BioRxiv => "bioRxiv",
            SourceType::MedRxiv => "medRxiv",
            SourceType::Arxiv => "arXiv",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::Other(s) => s,
        }
    }

    /// Returns the registry key of the source
    pub fn id(&self) -> &str {
        match self {
            SourceType::PubMed => "pubmed",
            SourceType::BioRxiv => "biorxiv",
            SourceType::MedRxiv => "medrxiv",
            SourceType::Arxiv => "arxiv",
            SourceType::SemanticScholar => "semantic_scholar",
            SourceType::Other(s) => s,
        }
    }

    /// Map a registry key back to a source tag
    pub fn from_id(id: &str) -> Self {
        match id {
            "pubmed" => SourceType::PubMed,
            "biorxiv" => SourceType::BioRxiv,
            "medrxiv" => SourceType::MedRxiv,
            "arxiv" => SourceType::Arxiv,
            "semantic_scholar" => SourceType::SemanticScholar,
            other => SourceType::Other(other.to_string()),
        }
    }
}

impl From<String> for SourceType {
    fn from(id: String) -> Self {
        SourceType::from_id(&id)
    }
}

impl From<SourceType> for String {
    fn from(source: SourceType) -> Self {
        source.id().to_string()
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Citation metrics, only filled in by sources that expose them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetrics {
    pub citation_count: Option<u32>,
    pub reference_count: Option<u32>,
    pub influential_citation_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_of_study: Vec<String>,
}

/// Stable key of a record: identifiers are only unique within one source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaperKey {
    pub identifier: String,
    pub source: String,
}

impl std::fmt::Display for PaperKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.identifier)
    }
}

/// A research paper from any academic source
///
/// Every adapter normalizes its provider payload into this shape, so the
/// merger and the citation engine never see provider-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Provider-scoped identifier (PMID, DOI, arXiv ID, Semantic Scholar ID)
    pub identifier: String,

    pub title: String,

    /// Authors in byline order
    #[serde(default)]
    pub authors: Vec<String>,

    pub r#abstract: Option<String>,

    /// Publication date, normalized to a calendar date when parseable
    pub published: Option<NaiveDate>,

    /// Journal or venue name
    pub venue: Option<String>,

    /// Canonical landing page
    pub url: String,

    pub pdf_url: Option<String>,

    /// DOI when the provider reports one alongside its own identifier
    pub doi: Option<String>,

    pub source: SourceType,

    pub metrics: Option<PaperMetrics>,
}

impl PaperRecord {
    /// Create a new record with required fields
    pub fn new(identifier: String, title: String, url: String, source: SourceType) -> Self {
        Self {
            identifier,
            title,
            authors: Vec::new(),
            r#abstract: None,
            published: None,
            venue: None,
            url,
            pdf_url: None,
            doi: None,
            source,
            metrics: None,
        }
    }

    /// Placeholder for a paper known only by identifier
    pub fn stub(identifier: impl Into<String>, source: SourceType) -> Self {
        Self::new(identifier.into(), String::new(), String::new(), source)
    }

    pub fn key(&self) -> PaperKey {
        PaperKey {
            identifier: self.identifier.clone(),
            source: self.source.id().to_string(),
        }
    }

    pub fn citation_count(&self) -> Option<u32> {
        self.metrics.as_ref().and_then(|m| m.citation_count)
    }

    /// Number of populated attributes, used to pick the survivor among duplicates
    pub fn richness(&self) -> usize {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());

        let mut count = 0;
        count += usize::from(!self.title.trim().is_empty());
        count += usize::from(!self.authors.is_empty());
        count += usize::from(filled(&self.r#abstract));
        count += usize::from(self.published.is_some());
        count += usize::from(filled(&self.venue));
        count += usize::from(!self.url.trim().is_empty());
        count += usize::from(filled(&self.pdf_url));
        count += usize::from(filled(&self.doi));
        if let Some(metrics) = &self.metrics {
            count += usize::from(metrics.citation_count.is_some());
            count += usize::from(metrics.reference_count.is_some());
            count += usize::from(metrics.influential_citation_count.is_some());
            count += usize::from(!metrics.fields_of_study.is_empty());
        }
        count
    }

    /// Check if paper has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.is_some()
    }
}

/// Builder for constructing PaperRecord objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: PaperRecord,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: SourceType,
    ) -> Self {
        Self {
            paper: PaperRecord::new(identifier.into(), title.into(), url.into(), source),
        }
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors
            .into_iter()
            .map(Into::into)
            .map(|a: String| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        self
    }

    /// Set abstract, ignoring blank text
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        let text = abstract_text.into();
        if !text.trim().is_empty() {
            self.paper.r#abstract = Some(text.trim().to_string());
        }
        self
    }

    /// Set the publication date from whatever string the provider returned
    pub fn published_date(mut self, date: impl AsRef<str>) -> Self {
        self.paper.published = parse_flexible_date(date.as_ref());
        self
    }

    pub fn published(mut self, date: NaiveDate) -> Self {
        self.paper.published = Some(date);
        self
    }

    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        let venue = venue.into();
        if !venue.trim().is_empty() {
            self.paper.venue = Some(venue);
        }
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = Some(url.into());
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.paper.doi = Some(doi.into());
        self
    }

    pub fn metrics(mut self, metrics: PaperMetrics) -> Self {
        self.paper.metrics = Some(metrics);
        self
    }

    /// Shorthand for a metrics block carrying only a citation count
    pub fn citations(mut self, count: u32) -> Self {
        self.paper
            .metrics
            .get_or_insert_with(PaperMetrics::default)
            .citation_count = Some(count);
        self
    }

    pub fn build(self) -> PaperRecord {
        self.paper
    }
}
