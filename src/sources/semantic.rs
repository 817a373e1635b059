//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{PaperBuilder, PaperMetrics, PaperRecord, SearchFilters, SourceType};
use crate::sources::{requested_dates, SourceAdapter, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, iso_format, normalize_arxiv_id, normalize_doi, with_retry, HttpClient};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
const SEMANTIC_RECOMMENDATIONS_BASE: &str = "https://api.semanticscholar.org/recommendations/v1";
const SEMANTIC_WEB_URL: &str = "https://www.semanticscholar.org/paper";

/// Fields requested for every paper payload
const PAPER_FIELDS: &str = "paperId,externalIds,title,abstract,authors,year,publicationDate,venue,journal,url,openAccessPdf,citationCount,referenceCount,influentialCitationCount,fieldsOfStudy";

/// The search endpoint caps `limit` at 100; citation listings at 1000
const SEARCH_MAX_LIMIT: usize = 100;
const LISTING_MAX_LIMIT: usize = 1000;

/// Semantic Scholar research source
///
/// Uses the Graph API for search, lookups and citation listings, and the
/// Recommendations API for related papers. An API key is optional but the
/// shared anonymous pool is heavily rate limited.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    api_key: Option<String>,
    graph_url: String,
    recommendations_url: String,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            graph_url: SEMANTIC_API_BASE.to_string(),
            recommendations_url: SEMANTIC_RECOMMENDATIONS_BASE.to_string(),
        })
    }

    /// Point both APIs at one server (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        self.graph_url = format!("{base}/graph/v1");
        self.recommendations_url = format!("{base}/recommendations/v1");
        self
    }

    /// Map user-facing identifiers onto the API's prefixed forms.
    ///
    /// Bare DOIs and arXiv IDs get their `DOI:` / `ARXIV:` prefix; anything
    /// else (S2 paper IDs, `CorpusId:`, `PMID:`) passes through.
    pub fn api_id(identifier: &str) -> Result<String, SourceError> {
        let id = identifier.trim();
        if id.is_empty() {
            return Err(SourceError::InvalidRequest("empty paper id".to_string()));
        }
        if id.contains(':') && !id.starts_with("http") {
            return Ok(id.to_string());
        }
        if let Some(doi) = normalize_doi(id) {
            return Ok(format!("DOI:{doi}"));
        }
        if let Some(arxiv) = normalize_arxiv_id(id) {
            return Ok(format!("ARXIV:{arxiv}"));
        }
        Ok(id.to_string())
    }

    /// `publicationDateOrYear` value; either end may be open
    fn date_param(filters: &SearchFilters) -> Result<Option<String>, SourceError> {
        Ok(requested_dates(filters)?.map(|range| {
            let bound = |date: Option<NaiveDate>| date.map(iso_format).unwrap_or_default();
            format!("{}:{}", bound(range.start), bound(range.end))
        }))
    }

    /// Free text sent to the search endpoint for field-filtered search
    fn advanced_query(filters: &SearchFilters) -> Option<String> {
        let parts: Vec<&str> = [&filters.term, &filters.title, &filters.author]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        url: String,
        params: Vec<(&'static str, String)>,
    ) -> Result<T, SourceError> {
        let client = Arc::clone(&self.client);
        let api_key = self.api_key.clone();

        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let mut request = client.get(&url).query(&params);
            if let Some(key) = &api_key {
                request = request.header("x-api-key", key);
            }
            async move { client.fetch_json::<T>(request).await }
        })
        .await
    }

    async fn search(&self, mut params: Vec<(&'static str, String)>, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        params.push(("limit", limit.clamp(1, SEARCH_MAX_LIMIT).to_string()));
        params.push(("fields", PAPER_FIELDS.to_string()));

        let response: SearchResponse = self
            .get_json(format!("{}/paper/search", self.graph_url), params)
            .await?;
        Ok(response.data.iter().filter_map(parse_paper).collect())
    }

    async fn listing(&self, identifier: &str, endpoint: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let id = Self::api_id(identifier)?;
        let response: ListingResponse = self
            .get_json(
                format!("{}/paper/{}/{}", self.graph_url, id, endpoint),
                vec![
                    ("fields", PAPER_FIELDS.to_string()),
                    ("limit", limit.clamp(1, LISTING_MAX_LIMIT).to_string()),
                ],
            )
            .await
            .map_err(|e| match e {
                SourceError::NotFound(_) => SourceError::CitationDataUnavailable(identifier.to_string()),
                other => other,
            })?;

        Ok(response
            .data
            .iter()
            .filter_map(|edge| edge.citing_paper.as_ref().or(edge.cited_paper.as_ref()))
            .filter_map(parse_paper)
            .collect())
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    external_ids: Option<S2ExternalIds>,
    title: Option<String>,
    r#abstract: Option<String>,
    year: Option<i32>,
    publication_date: Option<String>,
    venue: Option<String>,
    journal: Option<S2Journal>,
    url: Option<String>,
    open_access_pdf: Option<S2OpenAccessPdf>,
    citation_count: Option<u32>,
    reference_count: Option<u32>,
    influential_citation_count: Option<u32>,
    fields_of_study: Option<Vec<String>>,
    #[serde(default)]
    authors: Vec<S2Author>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Journal {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

/// Citations carry `citingPaper`, references carry `citedPaper`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingEdge {
    citing_paper: Option<S2Paper>,
    cited_paper: Option<S2Paper>,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    data: Vec<ListingEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationsResponse {
    #[serde(default)]
    recommended_papers: Vec<S2Paper>,
}

/// Parse Semantic Scholar paper data; entries without a paper ID are dropped
fn parse_paper(data: &S2Paper) -> Option<PaperRecord> {
    let paper_id = data.paper_id.as_deref().filter(|id| !id.is_empty())?;
    let url = data
        .url
        .clone()
        .unwrap_or_else(|| format!("{SEMANTIC_WEB_URL}/{paper_id}"));

    let mut builder = PaperBuilder::new(
        paper_id,
        data.title.clone().unwrap_or_default(),
        url,
        SourceType::SemanticScholar,
    )
    .authors(data.authors.iter().filter_map(|a| a.name.clone()))
    .metrics(PaperMetrics {
        citation_count: data.citation_count,
        reference_count: data.reference_count,
        influential_citation_count: data.influential_citation_count,
        fields_of_study: data.fields_of_study.clone().unwrap_or_default(),
    });

    if let Some(text) = &data.r#abstract {
        builder = builder.abstract_text(text.clone());
    }
    if let Some(date) = data
        .publication_date
        .clone()
        .or_else(|| data.year.map(|y| y.to_string()))
    {
        builder = builder.published_date(date);
    }
    if let Some(venue) = data
        .venue
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| data.journal.as_ref().and_then(|j| j.name.clone()))
    {
        builder = builder.venue(venue);
    }
    if let Some(doi) = data.external_ids.as_ref().and_then(|ids| ids.doi.clone()) {
        builder = builder.doi(doi);
    }
    if let Some(pdf) = data.open_access_pdf.as_ref().and_then(|p| p.url.clone()) {
        if !pdf.is_empty() {
            builder = builder.pdf_url(pdf);
        }
    }

    Some(builder.build())
}

#[async_trait]
impl SourceAdapter for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic_scholar"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::ADVANCED_SEARCH
            | SourceCapabilities::METADATA
            | SourceCapabilities::DOWNLOAD
            | SourceCapabilities::CITATIONS
            | SourceCapabilities::RECOMMENDATIONS
    }

    async fn search_by_keywords(&self, keywords: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        self.search(vec![("query", keywords.trim().to_string())], limit).await
    }

    async fn search_advanced(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let query = Self::advanced_query(filters).ok_or_else(|| {
            SourceError::UnsupportedFilter("Semantic Scholar needs a term, title or author".to_string())
        })?;

        let mut params = vec![("query", query)];
        if let Some(range) = Self::date_param(filters)? {
            params.push(("publicationDateOrYear", range));
        }
        if let Some(journal) = &filters.journal {
            params.push(("venue", journal.clone()));
        }

        // The author only feeds the free-text query, so over-fetch and filter
        let mut papers = self.search(params, limit.saturating_mul(2)).await?;
        if let Some(author) = filters.author.as_deref().map(str::to_lowercase) {
            papers.retain(|p| p.authors.iter().any(|a| a.to_lowercase().contains(&author)));
        }
        papers.truncate(limit);
        Ok(papers)
    }

    async fn get_metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        let id = Self::api_id(identifier)?;
        let paper: S2Paper = self
            .get_json(
                format!("{}/paper/{}", self.graph_url, id),
                vec![("fields", PAPER_FIELDS.to_string())],
            )
            .await
            .map_err(|e| match e {
                SourceError::NotFound(_) => SourceError::NotFound(identifier.to_string()),
                other => other,
            })?;
        parse_paper(&paper).ok_or_else(|| SourceError::NotFound(identifier.to_string()))
    }

    async fn download_pdf(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        let record = self.get_metadata(identifier).await?;
        let pdf_url = record.pdf_url.ok_or_else(|| {
            SourceError::Unavailable(format!(
                "No open access PDF for {}; try {}",
                record.identifier, record.url
            ))
        })?;

        let client = Arc::clone(&self.client);
        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let request = client.get(&pdf_url);
            async move { client.fetch_bytes(request).await }
        })
        .await
    }

    async fn get_citations(&self, identifier: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        self.listing(identifier, "citations", limit).await
    }

    async fn get_references(&self, identifier: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        self.listing(identifier, "references", limit).await
    }

    async fn get_recommendations(&self, identifier: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let id = Self::api_id(identifier)?;
        let response: RecommendationsResponse = self
            .get_json(
                format!("{}/papers/forpaper/{}", self.recommendations_url, id),
                vec![
                    ("fields", PAPER_FIELDS.to_string()),
                    ("limit", limit.clamp(1, 500).to_string()),
                ],
            )
            .await?;
        Ok(response.recommended_papers.iter().filter_map(parse_paper).collect())
    }
}
