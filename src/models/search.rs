//! Search request models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::utils::{parse_query_date, parse_query_end_date};

/// Field-specific filters for an advanced search.
///
/// Date bounds are kept exactly as the caller wrote them; each adapter turns
/// them into its provider's native format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub title: Option<String>,
    pub author: Option<String>,
    pub journal: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Free-text term searched across all fields
    pub term: Option<String>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = Some(journal.into());
        self
    }

    pub fn start_date(mut self, date: impl Into<String>) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn end_date(mut self, date: impl Into<String>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    /// Trim every field and drop the blank ones
    pub fn normalize(self) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        Self {
            title: clean(self.title),
            author: clean(self.author),
            journal: clean(self.journal),
            start_date: clean(self.start_date),
            end_date: clean(self.end_date),
            term: clean(self.term),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.journal.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.term.is_none()
    }

    pub fn has_date_range(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    /// Parsed date interval, `None` when no bound is set
    pub fn date_range(&self) -> Result<Option<DateRange>, ResearchError> {
        if !self.has_date_range() {
            return Ok(None);
        }

        // A partial end bound covers its whole year or month
        let range = DateRange {
            start: parse_bound("start_date", &self.start_date, parse_query_date)?,
            end: parse_bound("end_date", &self.end_date, parse_query_end_date)?,
        };

        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(ResearchError::InvalidQuery(format!(
                    "date range is inverted: {start} is after {end}"
                )));
            }
        }

        Ok(Some(range))
    }

    /// The same filters minus the journal constraint, if that changes anything
    pub fn without_journal(&self) -> Option<Self> {
        self.journal.as_ref()?;
        let reduced = Self {
            journal: None,
            ..self.clone()
        };
        (!reduced.is_empty()).then_some(reduced)
    }
}

fn parse_bound(
    label: &str,
    value: &Option<String>,
    parser: fn(&str) -> Option<NaiveDate>,
) -> Result<Option<NaiveDate>, ResearchError> {
    match value {
        None => Ok(None),
        Some(raw) => parser(raw).map(Some).ok_or_else(|| {
            ResearchError::InvalidQuery(format!(
                "{label} '{raw}' is not a date (expected YYYY-MM-DD or YYYY/MM/DD)"
            ))
        }),
    }
}

/// Closed date interval; a missing bound leaves that side open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// How merged results are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    /// Sources interleaved in dispatch order, each keeping its own order
    Relevance,
    /// Newest first
    DateDescending,
}

/// A search request: plain keywords or structured filters, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchQuery {
    Keywords(String),
    Advanced(SearchFilters),
}

impl SearchQuery {
    pub fn keywords(keywords: impl Into<String>) -> Self {
        SearchQuery::Keywords(keywords.into())
    }

    pub fn advanced(filters: SearchFilters) -> Self {
        SearchQuery::Advanced(filters)
    }

    /// Trimmed copy with blank filters removed
    pub fn normalize(self) -> Self {
        match self {
            SearchQuery::Keywords(k) => SearchQuery::Keywords(k.trim().to_string()),
            SearchQuery::Advanced(f) => SearchQuery::Advanced(f.normalize()),
        }
    }

    /// Reject malformed queries before anything is dispatched
    pub fn validate(&self) -> Result<(), ResearchError> {
        match self {
            SearchQuery::Keywords(k) if k.trim().is_empty() => Err(ResearchError::InvalidQuery(
                "keywords must not be empty".to_string(),
            )),
            SearchQuery::Keywords(_) => Ok(()),
            SearchQuery::Advanced(filters) => {
                let filters = filters.clone().normalize();
                if filters.is_empty() {
                    return Err(ResearchError::InvalidQuery(
                        "advanced search needs at least one filter".to_string(),
                    ));
                }
                filters.date_range().map(|_| ())
            }
        }
    }

    /// Date ordering applies to date-bounded filter searches with no free text
    pub fn ranking(&self) -> Ranking {
        match self {
            SearchQuery::Advanced(filters) if filters.has_date_range() && filters.term.is_none() => {
                Ranking::DateDescending
            }
            _ => Ranking::Relevance,
        }
    }
}
