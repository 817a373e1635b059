//! arXiv research source implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use feed_rs::parser;
use std::sync::Arc;

use crate::models::{PaperBuilder, PaperRecord, SearchFilters, SourceType};
use crate::sources::{requested_dates, SourceAdapter, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, normalize_arxiv_id, normalize_doi, with_retry, HttpClient};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
/// Base URL for arXiv abstract pages
const ARXIV_ABS_URL: &str = "https://arxiv.org/abs";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

/// The API answers at most this many entries per request
const ARXIV_MAX_RESULTS: usize = 2000;

/// arXiv research source
///
/// Supports:
/// - Keyword and field-filtered search over the Atom API
/// - Metadata lookup by arXiv ID
/// - PDF download
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    api_url: String,
    pdf_url: String,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            api_url: ARXIV_API_URL.to_string(),
            pdf_url: ARXIV_PDF_URL.to_string(),
        })
    }

    /// Use another API endpoint (for testing)
    pub fn with_base_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_pdf_url(mut self, pdf_url: impl Into<String>) -> Self {
        self.pdf_url = pdf_url.into();
        self
    }

    /// Parse an arXiv ID from various formats
    ///
    /// Handles formats like:
    /// - "2301.12345"
    /// - "2301.12345v1" (version is stripped)
    /// - "arxiv:2301.12345"
    /// - "https://arxiv.org/abs/2301.12345v1"
    pub fn parse_id(id: &str) -> Result<String, SourceError> {
        normalize_arxiv_id(id)
            .ok_or_else(|| SourceError::NotFound(format!("'{id}' is not an arXiv ID")))
    }

    /// `prefix:value`, quoted when the value is a phrase
    fn fielded(prefix: &str, value: &str) -> String {
        let value = value.trim().replace('"', "");
        if value.contains(char::is_whitespace) {
            format!("{prefix}:\"{value}\"")
        } else {
            format!("{prefix}:{value}")
        }
    }

    /// Every keyword must appear somewhere in the record
    fn build_keyword_query(keywords: &str) -> String {
        keywords
            .split_whitespace()
            .map(|word| Self::fielded("all", word))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Build search query for field-filtered search
    fn build_search_query(filters: &SearchFilters) -> Result<String, SourceError> {
        let mut parts = Vec::new();

        if let Some(term) = &filters.term {
            parts.push(Self::build_keyword_query(term));
        }
        if let Some(title) = &filters.title {
            parts.push(Self::fielded("ti", title));
        }
        if let Some(author) = &filters.author {
            parts.push(Self::fielded("au", author));
        }
        if let Some(journal) = &filters.journal {
            parts.push(Self::fielded("jr", journal));
        }

        // arXiv submission dates are YYYYMMDDHHMM
        if let Some(range) = requested_dates(filters)? {
            let bound = |date: Option<NaiveDate>, open: &str, time: &str| {
                date.map_or_else(|| open.to_string(), |d| format!("{}{time}", d.format("%Y%m%d")))
            };
            parts.push(format!(
                "submittedDate:[{} TO {}]",
                bound(range.start, "199101010000", "0000"),
                bound(range.end, "300012312359", "2359")
            ));
        }

        if parts.is_empty() {
            return Err(SourceError::InvalidRequest("no search fields given".to_string()));
        }
        Ok(parts.join(" AND "))
    }

    async fn fetch_feed(&self, params: Vec<(&'static str, String)>) -> Result<Vec<PaperRecord>, SourceError> {
        let client = Arc::clone(&self.client);
        let url = self.api_url.clone();

        // Execute search with retry logic for transient errors
        let body = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let request = client
                .get(&url)
                .header("Accept", "application/atom+xml")
                .query(&params);
            async move { client.fetch_bytes(request).await }
        })
        .await?;

        parse_feed(&body)
    }

    async fn query(&self, search_query: String, limit: usize, sort_by: &str) -> Result<Vec<PaperRecord>, SourceError> {
        tracing::debug!("arXiv query: {}", search_query);
        self.fetch_feed(vec![
            ("search_query", search_query),
            ("start", "0".to_string()),
            ("max_results", limit.min(ARXIV_MAX_RESULTS).to_string()),
            ("sortBy", sort_by.to_string()),
            ("sortOrder", "descending".to_string()),
        ])
        .await
    }
}

/// Parse an arXiv Atom feed into records
fn parse_feed(body: &[u8]) -> Result<Vec<PaperRecord>, SourceError> {
    let feed = parser::parse(body)
        .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))?;

    // Malformed queries come back as a single "Error" entry
    if let Some(error) = feed.entries.iter().find(|e| e.id.contains("/api/errors")) {
        let detail = error
            .summary
            .as_ref()
            .map(|s| s.content.clone())
            .unwrap_or_else(|| error.id.clone());
        return Err(SourceError::InvalidRequest(format!("arXiv rejected the query: {detail}")));
    }

    Ok(feed.entries.iter().filter_map(parse_entry).collect())
}

/// Parse arXiv Atom feed entry into a record
fn parse_entry(entry: &feed_rs::model::Entry) -> Option<PaperRecord> {
    let paper_id = normalize_arxiv_id(&entry.id)?;

    // Titles and abstracts are hard-wrapped in the feed
    let unwrap = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");

    let title = entry
        .title
        .as_ref()
        .map(|t| unwrap(&t.content))
        .unwrap_or_default();

    let mut builder = PaperBuilder::new(
        paper_id.clone(),
        title,
        format!("{ARXIV_ABS_URL}/{paper_id}"),
        SourceType::Arxiv,
    )
    .authors(entry.authors.iter().map(|a| a.name.clone()))
    .pdf_url(format!("{ARXIV_PDF_URL}/{paper_id}.pdf"));

    if let Some(summary) = &entry.summary {
        builder = builder.abstract_text(unwrap(&summary.content));
    }
    if let Some(published) = entry.published.or(entry.updated) {
        builder = builder.published(published.date_naive());
    }
    if let Some(category) = entry.categories.first() {
        builder = builder.venue(format!("arXiv preprint ({})", category.term));
    }

    // The DOI, when the paper has one, is a `related` link titled "doi"
    if let Some(doi) = entry
        .links
        .iter()
        .filter(|l| l.title.as_deref() == Some("doi"))
        .find_map(|l| normalize_doi(&l.href))
    {
        builder = builder.doi(doi);
    }

    Some(builder.build())
}

#[async_trait]
impl SourceAdapter for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::ADVANCED_SEARCH
            | SourceCapabilities::METADATA
            | SourceCapabilities::DOWNLOAD
    }

    async fn search_by_keywords(&self, keywords: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        self.query(Self::build_keyword_query(keywords), limit, "relevance").await
    }

    async fn search_advanced(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let search_query = Self::build_search_query(filters)?;
        self.query(search_query, limit, "submittedDate").await
    }

    async fn get_metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        let paper_id = Self::parse_id(identifier)?;
        self.fetch_feed(vec![("id_list", paper_id.clone()), ("max_results", "1".to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or(SourceError::NotFound(paper_id))
    }

    async fn download_pdf(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        let paper_id = Self::parse_id(identifier)?;
        let url = format!("{}/{}.pdf", self.pdf_url, paper_id);
        let client = Arc::clone(&self.client);

        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let request = client.get(&url);
            async move { client.fetch_bytes(request).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2024-03-01T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v2</id>
    <updated>2023-02-01T10:00:00Z</updated>
    <published>2023-01-15T10:00:00Z</published>
    <title>Attention Is
      Still All You Need</title>
    <summary>  We revisit
      transformers.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2301.12345v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2301.12345v2" rel="related" type="application/pdf"/>
    <link title="doi" href="http://dx.doi.org/10.1234/Test.5678" rel="related"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    const ERROR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2024-03-01T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
    <title>Error</title>
    <summary>incorrect id format for 1234</summary>
    <updated>2024-03-01T00:00:00-05:00</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_id() {
        assert_eq!(ArxivSource::parse_id("2301.12345").unwrap(), "2301.12345");
        assert_eq!(ArxivSource::parse_id("arXiv:2301.12345v3").unwrap(), "2301.12345");
        assert_eq!(
            ArxivSource::parse_id("https://arxiv.org/abs/2301.12345v1").unwrap(),
            "2301.12345"
        );
        assert_eq!(ArxivSource::parse_id("math.GT/0104020").unwrap(), "math.gt/0104020");
        assert!(ArxivSource::parse_id("").is_err());
        assert!(matches!(
            ArxivSource::parse_id("not an id"),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_keyword_query_requires_every_word() {
        assert_eq!(
            ArxivSource::build_keyword_query("graph neural networks"),
            "all:graph AND all:neural AND all:networks"
        );
    }

    #[test]
    fn test_build_search_query() {
        let filters = SearchFilters::new()
            .title("diffusion models")
            .author("Ho")
            .start_date("2020-01-01");
        assert_eq!(
            ArxivSource::build_search_query(&filters).unwrap(),
            "ti:\"diffusion models\" AND au:Ho AND submittedDate:[202001010000 TO 300012312359]"
        );
    }

    #[test]
    fn test_build_search_query_closed_range() {
        let filters = SearchFilters::new().start_date("2021/03/01").end_date("2021/03/31");
        assert_eq!(
            ArxivSource::build_search_query(&filters).unwrap(),
            "submittedDate:[202103010000 TO 202103312359]"
        );

        let month = SearchFilters::new().start_date("2021-03").end_date("2021-03");
        assert_eq!(
            ArxivSource::build_search_query(&month).unwrap(),
            "submittedDate:[202103010000 TO 202103312359]"
        );
    }

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(papers.len(), 1);

        let paper = &papers[0];
        assert_eq!(paper.identifier, "2301.12345");
        assert_eq!(paper.title, "Attention Is Still All You Need");
        assert_eq!(paper.r#abstract.as_deref(), Some("We revisit transformers."));
        assert_eq!(paper.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(paper.published.unwrap().to_string(), "2023-01-15");
        assert_eq!(paper.doi.as_deref(), Some("10.1234/test.5678"));
        assert_eq!(paper.venue.as_deref(), Some("arXiv preprint (cs.LG)"));
        assert_eq!(paper.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2301.12345.pdf"));
    }

    #[test]
    fn test_error_entry_is_invalid_request() {
        assert!(matches!(
            parse_feed(ERROR_FEED.as_bytes()),
            Err(SourceError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_search_with_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:attention".into()),
                Matcher::UrlEncoded("max_results".into(), "3".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let source = ArxivSource::new()
            .unwrap()
            .with_base_url(format!("{}/api/query", server.url()));
        let papers = source.search_by_keywords("attention", 3).await.unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].source, SourceType::Arxiv);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_metadata_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"><title>x</title><id>q</id><updated>2024-03-01T00:00:00Z</updated></feed>"#,
            )
            .create_async()
            .await;

        let source = ArxivSource::new()
            .unwrap()
            .with_base_url(format!("{}/api/query", server.url()));
        assert!(matches!(
            source.get_metadata("2301.99999").await,
            Err(SourceError::NotFound(_))
        ));
    }
}
