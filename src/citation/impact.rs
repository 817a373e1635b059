//! Single-paper impact evaluation from provider citation metrics.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::models::{PaperKey, PaperRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImpactLevel {
    High,
    Medium,
    Emerging,
}

impl ImpactLevel {
    fn from_score(score: f64) -> Self {
        if score > 70.0 {
            ImpactLevel::High
        } else if score > 30.0 {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Emerging
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImpactLevel::High => "High",
            ImpactLevel::Medium => "Medium",
            ImpactLevel::Emerging => "Emerging",
        };
        f.write_str(label)
    }
}

/// Observations attached to a report when a threshold is crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactInsight {
    /// More than ten citations per year
    HighVelocity,
    /// Over 30% of citations are influential
    InfluentialShare,
    /// Under two years old with more than fifty citations
    RisingStar,
}

impl fmt::Display for ImpactInsight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ImpactInsight::HighVelocity => "High citation velocity; sustained research interest",
            ImpactInsight::InfluentialShare => "Large share of influential citations",
            ImpactInsight::RisingStar => "Recently published yet already highly cited",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub paper: PaperKey,
    pub title: String,
    pub citation_count: u32,
    pub influential_citation_count: u32,
    /// Whole years since publication, at least 1
    pub years_since_publication: u32,
    pub citation_velocity: f64,
    pub fields_of_study: Vec<String>,
    pub cross_disciplinary: bool,
    /// 0..=100
    pub score: f64,
    pub level: ImpactLevel,
    pub insights: Vec<ImpactInsight>,
}

impl ImpactReport {
    /// Evaluate `record` as of `today`. Missing metrics count as zero and an
    /// unknown publication date as one year.
    pub fn evaluate(record: &PaperRecord, today: NaiveDate) -> Self {
        let metrics = record.metrics.clone().unwrap_or_default();
        let citations = metrics.citation_count.unwrap_or(0);
        let influential = metrics.influential_citation_count.unwrap_or(0);

        let years = record
            .published
            .map(|date| (today.year() - date.year()).max(1) as u32)
            .unwrap_or(1);
        let velocity = f64::from(citations) / f64::from(years);

        let score = (0.3 * f64::from(citations) + 2.0 * f64::from(influential) + 5.0 * velocity).min(100.0);

        let mut insights = Vec::new();
        if velocity > 10.0 {
            insights.push(ImpactInsight::HighVelocity);
        }
        if f64::from(influential) / f64::from(citations.max(1)) > 0.3 {
            insights.push(ImpactInsight::InfluentialShare);
        }
        if years < 2 && citations > 50 {
            insights.push(ImpactInsight::RisingStar);
        }

        Self {
            paper: record.key(),
            title: record.title.clone(),
            citation_count: citations,
            influential_citation_count: influential,
            years_since_publication: years,
            citation_velocity: velocity,
            cross_disciplinary: metrics.fields_of_study.len() > 2,
            fields_of_study: metrics.fields_of_study,
            score,
            level: ImpactLevel::from_score(score),
            insights,
        }
    }
}
