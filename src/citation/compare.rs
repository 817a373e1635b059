//! Side-by-side comparison of a handful of papers from their metadata.

use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ResearchError;
use crate::models::PaperRecord;

/// Fewest papers a comparison accepts
pub const MIN_COMPARED: usize = 2;
/// Most papers a comparison accepts
pub const MAX_COMPARED: usize = 5;

/// A field set larger than this counts as interdisciplinary
const INTERDISCIPLINARY_FIELDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonAspect {
    Impact,
    Timeline,
    Fields,
}

impl ComparisonAspect {
    pub const ALL: [ComparisonAspect; 3] = [
        ComparisonAspect::Impact,
        ComparisonAspect::Timeline,
        ComparisonAspect::Fields,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonAspect::Impact => "impact",
            ComparisonAspect::Timeline => "timeline",
            ComparisonAspect::Fields => "fields",
        }
    }
}

impl fmt::Display for ComparisonAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonAspect {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ComparisonAspect::ALL
            .into_iter()
            .find(|aspect| aspect.as_str() == wanted)
            .ok_or_else(|| {
                ResearchError::InvalidQuery(format!(
                    "unknown comparison aspect '{s}' (expected impact, timeline or fields)"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactComparison {
    pub highest_cited: u32,
    pub lowest_cited: u32,
    pub citation_range: u32,
    /// Title of the most-cited paper; ties keep the first requested
    pub most_cited_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineComparison {
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    /// Zero unless at least two papers carry a year
    pub time_span: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldComparison {
    /// Union of all fields of study, sorted
    pub fields: Vec<String>,
    pub interdisciplinary: bool,
}

/// A paper that could not be looked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupFailure {
    pub identifier: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub aspects: Vec<ComparisonAspect>,
    /// Resolved papers in request order
    pub papers: Vec<PaperRecord>,
    pub failures: Vec<LookupFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldComparison>,
}

impl ComparisonReport {
    /// Compare `papers` on each requested aspect. Missing citation counts
    /// count as zero. Impact is left out when no paper resolved.
    pub fn build(
        aspects: &[ComparisonAspect],
        papers: Vec<PaperRecord>,
        failures: Vec<LookupFailure>,
    ) -> Self {
        let wants = |aspect| aspects.contains(&aspect);

        let impact = if wants(ComparisonAspect::Impact) {
            compare_impact(&papers)
        } else {
            None
        };
        let timeline = wants(ComparisonAspect::Timeline).then(|| compare_timeline(&papers));
        let fields = wants(ComparisonAspect::Fields).then(|| compare_fields(&papers));

        Self {
            aspects: aspects.to_vec(),
            papers,
            failures,
            impact,
            timeline,
            fields,
        }
    }
}

fn compare_impact(papers: &[PaperRecord]) -> Option<ImpactComparison> {
    let counts: Vec<u32> = papers
        .iter()
        .map(|p| p.citation_count().unwrap_or(0))
        .collect();
    let highest = counts.iter().copied().max()?;
    let lowest = counts.iter().copied().min()?;
    let top = counts.iter().position(|&c| c == highest)?;

    Some(ImpactComparison {
        highest_cited: highest,
        lowest_cited: lowest,
        citation_range: highest - lowest,
        most_cited_title: papers[top].title.clone(),
    })
}

fn compare_timeline(papers: &[PaperRecord]) -> TimelineComparison {
    let years: Vec<i32> = papers
        .iter()
        .filter_map(|p| p.published.map(|d| d.year()))
        .collect();
    let earliest = years.iter().copied().min();
    let latest = years.iter().copied().max();

    TimelineComparison {
        earliest_year: earliest,
        latest_year: latest,
        time_span: match (earliest, latest) {
            (Some(first), Some(last)) if years.len() > 1 => last - first,
            _ => 0,
        },
    }
}

fn compare_fields(papers: &[PaperRecord]) -> FieldComparison {
    let fields: BTreeSet<String> = papers
        .iter()
        .filter_map(|p| p.metrics.as_ref())
        .flat_map(|m| m.fields_of_study.iter().cloned())
        .collect();

    FieldComparison {
        interdisciplinary: fields.len() > INTERDISCIPLINARY_FIELDS,
        fields: fields.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperBuilder, PaperMetrics, SourceType};
    use chrono::NaiveDate;

    fn paper(id: &str, year: Option<i32>, citations: Option<u32>, fields: &[&str]) -> PaperRecord {
        let mut builder = PaperBuilder::new(id, format!("Paper {id}"), "https://x", SourceType::SemanticScholar)
            .metrics(PaperMetrics {
                citation_count: citations,
                fields_of_study: fields.iter().map(|f| f.to_string()).collect(),
                ..PaperMetrics::default()
            });
        if let Some(y) = year {
            builder = builder.published(NaiveDate::from_ymd_opt(y, 5, 1).unwrap());
        }
        builder.build()
    }

    #[test]
    fn test_impact_and_timeline() {
        let papers = vec![
            paper("a", Some(2012), Some(900), &["Biology"]),
            paper("b", Some(2020), Some(1500), &["Medicine"]),
            paper("c", None, None, &[]),
        ];
        let report = ComparisonReport::build(&ComparisonAspect::ALL, papers, Vec::new());

        assert_eq!(
            report.impact,
            Some(ImpactComparison {
                highest_cited: 1500,
                lowest_cited: 0,
                citation_range: 1500,
                most_cited_title: "Paper b".to_string(),
            })
        );
        assert_eq!(
            report.timeline,
            Some(TimelineComparison {
                earliest_year: Some(2012),
                latest_year: Some(2020),
                time_span: 8,
            })
        );
    }

    #[test]
    fn test_most_cited_tie_keeps_first() {
        let papers = vec![paper("a", None, Some(10), &[]), paper("b", None, Some(10), &[])];
        let report = ComparisonReport::build(&[ComparisonAspect::Impact], papers, Vec::new());
        let impact = report.impact.unwrap();
        assert_eq!(impact.most_cited_title, "Paper a");
        assert_eq!(impact.citation_range, 0);
        assert!(report.timeline.is_none());
        assert!(report.fields.is_none());
    }

    #[test]
    fn test_single_year_has_no_span() {
        let papers = vec![paper("a", Some(2019), None, &[]), paper("b", None, None, &[])];
        let timeline = ComparisonReport::build(&[ComparisonAspect::Timeline], papers, Vec::new())
            .timeline
            .unwrap();
        assert_eq!(timeline.earliest_year, Some(2019));
        assert_eq!(timeline.time_span, 0);
    }

    #[test]
    fn test_fields_union_and_interdisciplinary() {
        let narrow = vec![
            paper("a", None, None, &["Biology", "Medicine"]),
            paper("b", None, None, &["Medicine", "Chemistry"]),
        ];
        let fields = ComparisonReport::build(&[ComparisonAspect::Fields], narrow, Vec::new())
            .fields
            .unwrap();
        assert_eq!(fields.fields, vec!["Biology", "Chemistry", "Medicine"]);
        assert!(!fields.interdisciplinary);

        let broad = vec![
            paper("a", None, None, &["Biology", "Medicine"]),
            paper("b", None, None, &["Computer Science", "Physics"]),
        ];
        let fields = ComparisonReport::build(&[ComparisonAspect::Fields], broad, Vec::new())
            .fields
            .unwrap();
        assert!(fields.interdisciplinary);
    }

    #[test]
    fn test_no_resolved_papers() {
        let failures = vec![LookupFailure {
            identifier: "x".into(),
            error: "Paper not found: x".into(),
        }];
        let report = ComparisonReport::build(&ComparisonAspect::ALL, Vec::new(), failures);
        assert!(report.impact.is_none());
        assert_eq!(report.timeline.unwrap().earliest_year, None);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_aspect_parsing() {
        assert_eq!("Timeline".parse::<ComparisonAspect>().unwrap(), ComparisonAspect::Timeline);
        assert!(matches!(
            "methodology".parse::<ComparisonAspect>(),
            Err(ResearchError::InvalidQuery(_))
        ));
    }
}
