//! PubMed research source implementation using E-utilities API.

use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{PaperBuilder, PaperRecord, SearchFilters, SourceType};
use crate::sources::{requested_dates, SourceAdapter, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, pubmed_format, with_retry, HttpClient};

/// PubMed E-utilities API base URL
const PUBMED_EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const PUBMED_WEB_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";
/// PubMed Central article pages; PDFs live under `{pmcid}/pdf/`
const PMC_ARTICLE_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";

/// Elements whose inline markup (`<i>`, `<sup>`, MathML) is reduced to plain text
const MIXED_CONTENT: [&[u8]; 2] = [b"ArticleTitle", b"AbstractText"];

/// Open bounds used when only one end of a publication date range is given
const OPEN_START: &str = "1800/01/01";
const OPEN_END: &str = "3000/12/31";

/// PubMed research source
///
/// Uses NCBI E-utilities: `esearch` resolves a query to PMIDs, `efetch`
/// returns the full records. Full text is only available through PubMed
/// Central when the article has a PMC id.
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    base_url: String,
    pmc_url: String,
    api_key: Option<String>,
}

impl PubMedSource {
    /// Create a new PubMed source; an NCBI key raises the rate limit
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: PUBMED_EUTILS_URL.to_string(),
            pmc_url: PMC_ARTICLE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Point the E-utilities calls somewhere else (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_pmc_url(mut self, pmc_url: impl Into<String>) -> Self {
        self.pmc_url = pmc_url.into();
        self
    }

    /// Build the E-utilities `term` for field-filtered search.
    ///
    /// A date range with one missing end is closed with a far-past or
    /// far-future bound.
    pub(crate) fn build_term(filters: &SearchFilters) -> Result<String, SourceError> {
        let mut parts = Vec::new();

        if let Some(term) = &filters.term {
            parts.push(term.clone());
        }
        if let Some(title) = &filters.title {
            parts.push(format!("{title}[Title]"));
        }
        if let Some(author) = &filters.author {
            parts.push(format!("{author}[Author]"));
        }
        if let Some(journal) = &filters.journal {
            parts.push(format!("{journal}[Journal]"));
        }

        if let Some(range) = requested_dates(filters)? {
            let bound = |date: Option<NaiveDate>, open: &str| {
                date.map_or_else(|| open.to_string(), pubmed_format)
            };
            parts.push(format!(
                "{}:{}[Date - Publication]",
                bound(range.start, OPEN_START),
                bound(range.end, OPEN_END)
            ));
        }

        if parts.is_empty() {
            return Err(SourceError::InvalidRequest("no search fields given".to_string()));
        }
        Ok(parts.join(" AND "))
    }

    fn with_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn get_text(&self, endpoint: &str, params: Vec<(&'static str, String)>) -> Result<String, SourceError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let params = self.with_key(params);
        let client = Arc::clone(&self.client);

        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let request = client.get(&url).query(&params);
            async move { client.fetch_text(request).await }
        })
        .await
    }

    /// Resolve `term` to PMIDs, then fetch their records
    async fn search_term(&self, term: String, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        tracing::debug!("PubMed esearch: {}", term);
        let xml = self
            .get_text(
                "esearch.fcgi",
                vec![
                    ("db", "pubmed".to_string()),
                    ("term", term),
                    ("retmax", limit.to_string()),
                    ("retmode", "xml".to_string()),
                ],
            )
            .await?;

        let ids = parse_search_response(&xml)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut papers = self.fetch_records(&ids).await?;
        papers.truncate(limit);
        Ok(papers)
    }

    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<PaperRecord>, SourceError> {
        let xml = self
            .get_text(
                "efetch.fcgi",
                vec![
                    ("db", "pubmed".to_string()),
                    ("id", ids.join(",")),
                    ("retmode", "xml".to_string()),
                ],
            )
            .await?;
        parse_fetch_response(&xml, &self.pmc_url)
    }

    fn clean_pmid(identifier: &str) -> Result<String, SourceError> {
        let id = identifier.trim();
        let id = id
            .strip_prefix("PMID:")
            .or_else(|| id.strip_prefix("pmid:"))
            .unwrap_or(id)
            .trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(SourceError::NotFound(format!("'{identifier}' is not a PMID")));
        }
        Ok(id.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct ESearchResult {
    IdList: Option<IdList>,
}

#[derive(Debug, Deserialize)]
struct IdList {
    #[serde(rename = "Id", default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedArticle {
    MedlineCitation: Option<MedlineCitation>,
    PubmedData: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct MedlineCitation {
    PMID: Option<Text>,
    Article: Option<Article>,
}

#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Article {
    Journal: Option<Journal>,
    ArticleTitle: Option<Text>,
    Abstract: Option<Abstract>,
    AuthorList: Option<AuthorList>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Journal {
    Title: Option<Text>,
    JournalIssue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JournalIssue {
    PubDate: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubDate {
    Year: Option<String>,
    Month: Option<String>,
    Day: Option<String>,
    MedlineDate: Option<String>,
}

impl PubDate {
    /// "2024 Jan 15", "2024 Jan", "2024", or a MedlineDate such as "2023 Dec-2024 Jan"
    fn as_string(&self) -> Option<String> {
        match &self.Year {
            Some(year) => {
                let parts: Vec<&str> = [Some(year.as_str()), self.Month.as_deref(), self.Day.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect();
                Some(parts.join(" "))
            }
            None => self.MedlineDate.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    sections: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Author {
    LastName: Option<String>,
    ForeName: Option<String>,
    CollectiveName: Option<String>,
}

impl Author {
    fn display(&self) -> Option<String> {
        if let Some(collective) = &self.CollectiveName {
            return Some(collective.clone());
        }
        let last = self.LastName.as_deref()?;
        Some(match &self.ForeName {
            Some(first) => format!("{first} {last}"),
            None => last.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedData {
    ArticleIdList: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: String,
    #[serde(rename = "$text", default)]
    value: String,
}

fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
    let result: ESearchResult = from_str(xml)?;
    Ok(result.IdList.map(|l| l.ids).unwrap_or_default())
}

fn article_id(article: &PubmedArticle, kind: &str) -> Option<String> {
    article
        .PubmedData
        .as_ref()
        .and_then(|pd| pd.ArticleIdList.as_ref())
        .and_then(|list| list.ids.iter().find(|id| id.id_type == kind))
        .map(|id| id.value.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Drop child tags inside titles and abstracts, keeping their text in place
fn flatten_mixed_content(xml: &str) -> Result<String, SourceError> {
    let xml_error = |e: quick_xml::Error| SourceError::Parse(format!("XML: {e}"));
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut in_mixed = false;
    let mut nested = 0usize;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match &event {
            Event::Eof => break,
            Event::Start(_) if in_mixed => {
                nested += 1;
                continue;
            }
            Event::End(_) if in_mixed && nested > 0 => {
                nested -= 1;
                continue;
            }
            Event::Empty(_) if in_mixed => continue,
            Event::Start(e) if MIXED_CONTENT.contains(&e.name().as_ref()) => in_mixed = true,
            Event::End(_) if in_mixed => in_mixed = false,
            _ => {}
        }
        writer
            .write_event(event)
            .map_err(|e| SourceError::Parse(format!("XML: {e}")))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| SourceError::Parse(format!("XML: {e}")))
}

fn parse_fetch_response(xml: &str, pmc_url: &str) -> Result<Vec<PaperRecord>, SourceError> {
    let set: PubmedArticleSet = from_str(&flatten_mixed_content(xml)?)?;

    let papers = set
        .articles
        .iter()
        .filter_map(|article| {
            let citation = article.MedlineCitation.as_ref()?;
            let pmid = citation.PMID.as_ref()?.value.trim().to_string();
            if pmid.is_empty() {
                return None;
            }
            let body = citation.Article.as_ref();

            let title = body
                .and_then(|a| a.ArticleTitle.as_ref())
                .map(|t| t.value.trim().to_string())
                .unwrap_or_default();
            let url = format!("{PUBMED_WEB_URL}/{pmid}/");

            let mut builder = PaperBuilder::new(pmid, title, url, SourceType::PubMed);

            if let Some(article) = body {
                if let Some(list) = &article.AuthorList {
                    builder = builder.authors(list.authors.iter().filter_map(Author::display));
                }
                if let Some(abs) = &article.Abstract {
                    let text = abs
                        .sections
                        .iter()
                        .map(|s| s.value.trim())
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    builder = builder.abstract_text(text);
                }
                if let Some(journal) = &article.Journal {
                    if let Some(title) = &journal.Title {
                        builder = builder.venue(title.value.trim());
                    }
                    if let Some(date) = journal
                        .JournalIssue
                        .as_ref()
                        .and_then(|ji| ji.PubDate.as_ref())
                        .and_then(PubDate::as_string)
                    {
                        builder = builder.published_date(date);
                    }
                }
            }

            if let Some(doi) = article_id(article, "doi") {
                builder = builder.doi(doi);
            }
            if let Some(pmcid) = article_id(article, "pmc") {
                builder = builder.pdf_url(format!("{pmc_url}/{pmcid}/pdf/"));
            }

            Some(builder.build())
        })
        .collect();

    Ok(papers)
}

#[async_trait]
impl SourceAdapter for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::ADVANCED_SEARCH
            | SourceCapabilities::METADATA
            | SourceCapabilities::DOWNLOAD
    }

    async fn search_by_keywords(&self, keywords: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        self.search_term(keywords.trim().to_string(), limit).await
    }

    async fn search_advanced(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let term = Self::build_term(filters)?;
        self.search_term(term, limit).await
    }

    async fn get_metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        let pmid = Self::clean_pmid(identifier)?;
        self.fetch_records(std::slice::from_ref(&pmid))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound(identifier.to_string()))
    }

    async fn download_pdf(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        let record = self.get_metadata(identifier).await?;
        let pdf_url = record.pdf_url.ok_or_else(|| {
            SourceError::Unavailable(format!(
                "PMID {} has no PubMed Central full text; see {}",
                record.identifier, record.url
            ))
        })?;

        tracing::debug!("Fetching PMC PDF {}", pdf_url);
        let bytes = self.client.fetch_bytes(self.client.get(&pdf_url)).await?;
        if !bytes.starts_with(b"%PDF") {
            return Err(SourceError::Unavailable(format!(
                "{pdf_url} did not return a PDF (article may not be open access)"
            )));
        }
        Ok(bytes)
    }
}
