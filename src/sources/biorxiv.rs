//! bioRxiv/medRxiv research source implementation.
//!
//! This module provides a shared implementation for both bioRxiv and medRxiv
//! since they use the same API with just a different server prefix.
//!
//! The API only lists preprints by posting date, so every search walks a date
//! window page by page and filters on the client side.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{DateRange, PaperBuilder, PaperRecord, SearchFilters, SourceType};
use crate::sources::{requested_dates, SourceAdapter, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, iso_format, normalize_doi, with_retry, HttpClient};

const BIORXIV_API_URL: &str = "https://api.biorxiv.org";

/// Default search window when no dates are given
const DEFAULT_WINDOW_DAYS: i64 = 365;
/// Upper bound on pages walked per search (the API serves 100 per page)
const MAX_SCAN_PAGES: usize = 20;

/// Server type for biorxiv/medrxiv
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    BioRxiv,
    MedRxiv,
}

impl ServerType {
    pub fn id(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "biorxiv",
            ServerType::MedRxiv => "medrxiv",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServerType::BioRxiv => "bioRxiv",
            ServerType::MedRxiv => "medRxiv",
        }
    }

    fn source_type(&self) -> SourceType {
        match self {
            ServerType::BioRxiv => SourceType::BioRxiv,
            ServerType::MedRxiv => SourceType::MedRxiv,
        }
    }

    fn content_url(&self, doi: &str, version: &str) -> String {
        format!("https://www.{}.org/content/{}v{}", self.id(), doi, version)
    }
}

/// bioRxiv or medRxiv, depending on `server`
#[derive(Debug, Clone)]
pub struct BiorxivSource {
    client: Arc<HttpClient>,
    server: ServerType,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    collection: Vec<Preprint>,
}

#[derive(Debug, Deserialize)]
struct Message {
    /// Sent as a string or a number depending on the endpoint
    total: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct Preprint {
    doi: String,
    #[serde(default)]
    title: String,
    /// "Smith, J.; Doe, A."
    #[serde(default)]
    authors: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    version: String,
    #[serde(default, rename = "abstract")]
    abstract_text: String,
}

impl DetailsResponse {
    fn total(&self) -> Option<usize> {
        let total = self.messages.first()?.total.as_ref()?;
        match total {
            serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Client-side matching for one search request
#[derive(Debug, Default)]
struct Criteria {
    /// Every token must appear in the title or abstract
    tokens: Vec<String>,
    title: Option<String>,
    author: Option<String>,
}

impl Criteria {
    fn keywords(text: &str) -> Self {
        Self {
            tokens: text.split_whitespace().map(str::to_lowercase).collect(),
            ..Self::default()
        }
    }

    fn from_filters(filters: &SearchFilters) -> Self {
        Self {
            tokens: filters
                .term
                .as_deref()
                .map(|t| t.split_whitespace().map(str::to_lowercase).collect())
                .unwrap_or_default(),
            title: filters.title.as_deref().map(str::to_lowercase),
            author: filters.author.as_deref().map(str::to_lowercase),
        }
    }

    fn matches(&self, preprint: &Preprint) -> bool {
        let title = preprint.title.to_lowercase();
        let text = format!("{} {}", title, preprint.abstract_text.to_lowercase());
        let contains = |needle: &Option<String>, haystack: &str| {
            needle.as_ref().map_or(true, |n| haystack.contains(n.as_str()))
        };

        self.tokens.iter().all(|t| text.contains(t.as_str()))
            && contains(&self.title, &title)
            && contains(&self.author, &preprint.authors.to_lowercase())
    }
}

impl BiorxivSource {
    pub fn new(server: ServerType) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            server,
            base_url: BIORXIV_API_URL.to_string(),
        })
    }

    /// Use another API endpoint (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve the posting-date window, filling open ends from a one-year span
    fn window(filters: &SearchFilters, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), SourceError> {
        let range = requested_dates(filters)?.unwrap_or(DateRange { start: None, end: None });
        let span = Duration::days(DEFAULT_WINDOW_DAYS);

        Ok(match (range.start, range.end) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, today.max(start)),
            (None, Some(end)) => (end - span, end),
            (None, None) => (today - span, today),
        })
    }

    async fn fetch_page(&self, path: String) -> Result<DetailsResponse, SourceError> {
        let url = format!("{}/details/{}/{}", self.base_url, self.server.id(), path);
        let client = Arc::clone(&self.client);

        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let request = client.get(&url);
            async move { client.fetch_json::<DetailsResponse>(request).await }
        })
        .await
    }

    /// Walk the window page by page until `limit` matches or the page budget runs out
    async fn scan(
        &self,
        (start, end): (NaiveDate, NaiveDate),
        criteria: &Criteria,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let mut found = Vec::new();
        let mut cursor = 0usize;

        for page in 0..MAX_SCAN_PAGES {
            let response = self
                .fetch_page(format!("{}/{}/{}", iso_format(start), iso_format(end), cursor))
                .await?;
            if response.collection.is_empty() {
                break;
            }

            cursor += response.collection.len();
            for preprint in &response.collection {
                if criteria.matches(preprint) {
                    found.push(self.to_record(preprint));
                    if found.len() >= limit {
                        return Ok(found);
                    }
                }
            }

            if response.total().is_some_and(|total| cursor >= total) {
                break;
            }
            if page + 1 == MAX_SCAN_PAGES {
                tracing::debug!(
                    "{} scan stopped after {} pages with {} matches",
                    self.server.display_name(),
                    MAX_SCAN_PAGES,
                    found.len()
                );
            }
        }

        Ok(found)
    }

    fn to_record(&self, preprint: &Preprint) -> PaperRecord {
        let version = if preprint.version.trim().is_empty() {
            "1"
        } else {
            preprint.version.trim()
        };
        let content = self.server.content_url(&preprint.doi, version);

        PaperBuilder::new(
            preprint.doi.clone(),
            preprint.title.trim(),
            content.clone(),
            self.server.source_type(),
        )
        .authors(preprint.authors.split(';'))
        .abstract_text(preprint.abstract_text.clone())
        .published_date(&preprint.date)
        .venue(format!("{} (preprint)", self.server.display_name()))
        .doi(preprint.doi.clone())
        .pdf_url(format!("{content}.full.pdf"))
        .build()
    }

    fn clean_doi(identifier: &str) -> Result<String, SourceError> {
        normalize_doi(identifier)
            .ok_or_else(|| SourceError::NotFound(format!("'{identifier}' is not a DOI")))
    }
}

#[async_trait]
impl SourceAdapter for BiorxivSource {
    fn id(&self) -> &str {
        self.server.id()
    }

    fn name(&self) -> &str {
        self.server.display_name()
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::ADVANCED_SEARCH
            | SourceCapabilities::METADATA
            | SourceCapabilities::DOWNLOAD
    }

    async fn search_by_keywords(&self, keywords: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let today = Utc::now().date_naive();
        let window = Self::window(&SearchFilters::new(), today)?;
        self.scan(window, &Criteria::keywords(keywords), limit).await
    }

    async fn search_advanced(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        if filters.journal.is_some() {
            return Err(SourceError::UnsupportedFilter(format!(
                "{} preprints have no journal",
                self.server.display_name()
            )));
        }
        let today = Utc::now().date_naive();
        let window = Self::window(filters, today)?;
        self.scan(window, &Criteria::from_filters(filters), limit).await
    }

    async fn get_metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        let doi = Self::clean_doi(identifier)?;
        let response = self.fetch_page(doi.clone()).await?;

        // One entry per posted version; the last one is current
        response
            .collection
            .last()
            .map(|p| self.to_record(p))
            .ok_or(SourceError::NotFound(doi))
    }

    async fn download_pdf(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        let record = self.get_metadata(identifier).await?;
        let pdf_url = record
            .pdf_url
            .ok_or_else(|| SourceError::Unavailable(format!("no PDF for {}", record.identifier)))?;

        let client = Arc::clone(&self.client);
        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let request = client.get(&pdf_url);
            async move { client.fetch_bytes(request).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn page(total: usize, items: &[(&str, &str, &str)]) -> String {
        let collection: Vec<serde_json::Value> = items
            .iter()
            .map(|(doi, title, abs)| {
                serde_json::json!({
                    "doi": doi,
                    "title": title,
                    "authors": "Smith, J.; Doe, A.",
                    "date": "2024-01-15",
                    "version": "2",
                    "type": "new results",
                    "category": "genomics",
                    "abstract": abs,
                    "server": "bioRxiv"
                })
            })
            .collect();
        serde_json::json!({
            "messages": [{"status": "ok", "count": items.len(), "total": total.to_string()}],
            "collection": collection
        })
        .to_string()
    }

    fn date(s: &str) -> NaiveDate {
        crate::utils::parse_query_date(s).unwrap()
    }

    #[test]
    fn test_window_defaults() {
        let today = date("2024-06-30");
        assert_eq!(
            BiorxivSource::window(&SearchFilters::new(), today).unwrap(),
            (date("2023-07-01"), today)
        );
        assert_eq!(
            BiorxivSource::window(&SearchFilters::new().start_date("2024-01-01"), today).unwrap(),
            (date("2024-01-01"), today)
        );
        assert_eq!(
            BiorxivSource::window(&SearchFilters::new().start_date("2024/01/01").end_date("2024/02/01"), today)
                .unwrap(),
            (date("2024-01-01"), date("2024-02-01"))
        );
        assert_eq!(
            BiorxivSource::window(&SearchFilters::new().start_date("2024-06").end_date("2024"), today)
                .unwrap(),
            (date("2024-06-01"), date("2024-12-31"))
        );
        assert!(matches!(
            BiorxivSource::window(&SearchFilters::new().start_date("2024-06").end_date("2023"), today),
            Err(SourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_criteria_matching() {
        let preprint = Preprint {
            doi: "10.1101/2024.01.15.575000".into(),
            title: "Single-cell CRISPR screens".into(),
            authors: "Smith, J.; Doe, A.".into(),
            date: "2024-01-15".into(),
            version: "1".into(),
            abstract_text: "We perturb enhancers in T cells.".into(),
        };

        assert!(Criteria::keywords("crispr enhancers").matches(&preprint));
        assert!(!Criteria::keywords("crispr mouse").matches(&preprint));

        let filters = SearchFilters::new().title("crispr").author("doe");
        assert!(Criteria::from_filters(&filters).matches(&preprint));
        let filters = SearchFilters::new().author("zhang");
        assert!(!Criteria::from_filters(&filters).matches(&preprint));
    }

    #[test]
    fn test_record_urls_use_version() {
        let source = BiorxivSource::new(ServerType::MedRxiv).unwrap();
        let preprint = Preprint {
            doi: "10.1101/2024.02.01.24302000".into(),
            title: "Trial".into(),
            authors: "Lee, K.".into(),
            date: "2024-02-01".into(),
            version: "3".into(),
            abstract_text: String::new(),
        };
        let record = source.to_record(&preprint);
        assert_eq!(record.source, SourceType::MedRxiv);
        assert_eq!(
            record.pdf_url.as_deref(),
            Some("https://www.medrxiv.org/content/10.1101/2024.02.01.24302000v3.full.pdf")
        );
        assert_eq!(record.authors, vec!["Lee, K."]);
        assert_eq!(record.venue.as_deref(), Some("medRxiv (preprint)"));
    }

    #[tokio::test]
    async fn test_journal_filter_unsupported() {
        let source = BiorxivSource::new(ServerType::BioRxiv).unwrap();
        let filters = SearchFilters::new().title("x").journal("Nature");
        assert!(matches!(
            source.search_advanced(&filters, 5).await,
            Err(SourceError::UnsupportedFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_advanced_scan_follows_cursor() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/details/biorxiv/2024-01-01/2024-01-31/0")
            .with_status(200)
            .with_body(page(
                3,
                &[
                    ("10.1101/a", "CRISPR in plants", ""),
                    ("10.1101/b", "Unrelated", ""),
                ],
            ))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/details/biorxiv/2024-01-01/2024-01-31/2")
            .with_status(200)
            .with_body(page(3, &[("10.1101/c", "More CRISPR", "")]))
            .create_async()
            .await;

        let source = BiorxivSource::new(ServerType::BioRxiv)
            .unwrap()
            .with_base_url(server.url());
        let filters = SearchFilters::new()
            .title("crispr")
            .start_date("2024-01-01")
            .end_date("2024-01-31");
        let papers = source.search_advanced(&filters, 10).await.unwrap();

        let ids: Vec<&str> = papers.iter().map(|p| p.identifier.as_str()).collect();
        assert_eq!(ids, vec!["10.1101/a", "10.1101/c"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_keyword_scan_stops_at_limit() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock(
                "GET",
                Matcher::Regex(r"^/details/biorxiv/\d{4}-\d{2}-\d{2}/\d{4}-\d{2}-\d{2}/0$".into()),
            )
            .with_status(200)
            .with_body(page(500, &[("10.1101/a", "Protein folding", "")]))
            .expect(1)
            .create_async()
            .await;

        let source = BiorxivSource::new(ServerType::BioRxiv)
            .unwrap()
            .with_base_url(server.url());
        let papers = source.search_by_keywords("folding", 1).await.unwrap();

        assert_eq!(papers.len(), 1);
        first.assert_async().await;
    }

    #[tokio::test]
    async fn test_metadata_takes_latest_version() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "messages": [{"status": "ok"}],
            "collection": [
                {"doi": "10.1101/2024.01.15.575000", "title": "Draft", "version": "1", "date": "2024-01-15"},
                {"doi": "10.1101/2024.01.15.575000", "title": "Final", "version": "2", "date": "2024-03-01"}
            ]
        });
        let _mock = server
            .mock("GET", "/details/biorxiv/10.1101/2024.01.15.575000")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let source = BiorxivSource::new(ServerType::BioRxiv)
            .unwrap()
            .with_base_url(server.url());
        let record = source
            .get_metadata("https://doi.org/10.1101/2024.01.15.575000")
            .await
            .unwrap();
        assert_eq!(record.title, "Final");
        assert_eq!(record.published.unwrap().to_string(), "2024-03-01");
    }

    #[tokio::test]
    async fn test_metadata_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/details/biorxiv/10.1101/missing")
            .with_status(200)
            .with_body(r#"{"messages":[{"status":"no posts found"}],"collection":[]}"#)
            .create_async()
            .await;

        let source = BiorxivSource::new(ServerType::BioRxiv)
            .unwrap()
            .with_base_url(server.url());
        assert!(matches!(
            source.get_metadata("10.1101/missing").await,
            Err(SourceError::NotFound(_))
        ));
    }
}
