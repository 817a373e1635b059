//! Deduplication utilities for papers across sources.
//!
//! Two records describe the same paper when they share a canonical identifier
//! (DOI, PMID or arXiv ID, compared without scheme prefixes or case), or when
//! their normalized titles are near-identical and their author lists overlap.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use strsim::jaro_winkler;

use crate::models::PaperRecord;

/// Minimum Jaro-Winkler similarity of normalized titles for a title match
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.95;

const DOI_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

const ARXIV_PREFIXES: [&str; 4] = [
    "https://arxiv.org/abs/",
    "http://arxiv.org/abs/",
    "arxiv.org/abs/",
    "arxiv:",
];

fn arxiv_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\d{4}\.\d{4,5}|[a-z][a-z.-]*(?:\.[a-z]{2})?/\d{7})(?:v\d+)?$").ok()
    })
    .as_ref()
}

fn version_suffix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"v\d+$").ok()).as_ref()
}

/// Canonical arXiv ID without URL prefix or version suffix, if `raw` is one
pub fn normalize_arxiv_id(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    let id = ARXIV_PREFIXES
        .iter()
        .find_map(|p| lower.strip_prefix(p))
        .unwrap_or(lower.as_str())
        .trim_end_matches(".pdf");
    if !arxiv_pattern()?.is_match(id) {
        return None;
    }
    Some(version_suffix()?.replace(id, "").into_owned())
}

/// Canonical DOI (lowercase, no resolver prefix), if `raw` is one
pub fn normalize_doi(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    let doi = DOI_PREFIXES
        .iter()
        .find_map(|p| lower.strip_prefix(p))
        .unwrap_or(lower.as_str());
    doi.starts_with("10.").then(|| doi.to_string())
}

/// Scheme-tagged identifier key.
///
/// DOIs, PMIDs and arXiv IDs are global; anything else is only meaningful
/// inside the source that issued it.
pub fn canonical_id(raw: &str, source_id: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(doi) = normalize_doi(trimmed) {
        return Some(format!("doi:{doi}"));
    }
    let lower = trimmed.to_lowercase();
    if let Some(pmid) = lower.strip_prefix("pmid:") {
        return Some(format!("pmid:{}", pmid.trim()));
    }
    if let Some(arxiv) = normalize_arxiv_id(&lower) {
        return Some(format!("arxiv:{arxiv}"));
    }
    if source_id == "pubmed" && lower.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("pmid:{lower}"));
    }
    Some(format!("{source_id}:{lower}"))
}

/// Every identifier key a record can be matched on
pub fn record_ids(paper: &PaperRecord) -> Vec<String> {
    let source = paper.source.id();
    let mut ids: Vec<String> = canonical_id(&paper.identifier, source).into_iter().collect();
    if let Some(doi) = paper.doi.as_deref().and_then(normalize_doi) {
        let key = format!("doi:{doi}");
        if !ids.contains(&key) {
            ids.push(key);
        }
    }
    ids
}

/// Normalize a title for comparison: lowercase, punctuation stripped,
/// whitespace collapsed
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Surname of an author as written by any of the providers:
/// "Doudna, Jennifer A." and "Jennifer A Doudna" both give "doudna"
fn surname(author: &str) -> Option<String> {
    let name = match author.split_once(',') {
        Some((last, _)) => last,
        None => author.split_whitespace().last()?,
    };
    let key: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect();
    (!key.is_empty()).then_some(key)
}

/// Check if the author lists share at least one surname.
///
/// Records without authors never overlap, so a bare title match is not enough.
pub fn authors_overlap(a: &PaperRecord, b: &PaperRecord) -> bool {
    let surnames_a: HashSet<String> = a.authors.iter().filter_map(|s| surname(s)).collect();
    if surnames_a.is_empty() {
        return false;
    }
    b.authors
        .iter()
        .filter_map(|s| surname(s))
        .any(|s| surnames_a.contains(&s))
}

fn titles_match(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && jaro_winkler(a, b) >= TITLE_SIMILARITY_THRESHOLD
}

/// Union-find over record indices
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Smaller index becomes the root so roots are first occurrences
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Partition papers into duplicate groups.
///
/// Every index appears in exactly one group; groups are ordered by their first
/// member and members ascend. Matching is transitive.
pub fn find_duplicate_groups(papers: &[PaperRecord]) -> Vec<Vec<usize>> {
    let mut sets = DisjointSet::new(papers.len());

    // Identifier matches in one pass
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for (idx, paper) in papers.iter().enumerate() {
        for id in record_ids(paper) {
            match by_id.get(&id) {
                Some(&first) => sets.union(first, idx),
                None => {
                    by_id.insert(id, idx);
                }
            }
        }
    }

    // Title matches need pairwise comparison
    let titles: Vec<String> = papers.iter().map(|p| normalize_title(&p.title)).collect();
    for i in 0..papers.len() {
        for j in (i + 1)..papers.len() {
            if sets.find(i) == sets.find(j) {
                continue;
            }
            if titles_match(&titles[i], &titles[j]) && authors_overlap(&papers[i], &papers[j]) {
                sets.union(i, j);
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for idx in 0..papers.len() {
        let root = sets.find(idx);
        match group_of_root.get(&root) {
            Some(&g) => groups[g].push(idx),
            None => {
                group_of_root.insert(root, groups.len());
                groups.push(vec![idx]);
            }
        }
    }
    groups
}

/// The member with the most populated fields; ties keep the earliest
pub fn pick_survivor(papers: &[PaperRecord], group: &[usize]) -> usize {
    let mut best = group[0];
    for &idx in &group[1..] {
        if papers[idx].richness() > papers[best].richness() {
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperBuilder, SourceType};

    fn paper(id: &str, title: &str, source: SourceType) -> PaperBuilder {
        PaperBuilder::new(id, title, format!("https://example.com/{id}"), source)
    }

    fn are_duplicates(a: &PaperRecord, b: &PaperRecord) -> bool {
        find_duplicate_groups(&[a.clone(), b.clone()]).len() == 1
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("  CRISPR-Cas9:  Gene   Editing! "),
            "crispr cas9 gene editing"
        );
    }

    #[test]
    fn test_normalize_identifiers() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1038/NATURE123"),
            Some("10.1038/nature123".to_string())
        );
        assert_eq!(normalize_doi("DOI:10.1/abc"), Some("10.1/abc".to_string()));
        assert_eq!(normalize_doi("12345"), None);

        assert_eq!(normalize_arxiv_id("2301.12345v2"), Some("2301.12345".to_string()));
        assert_eq!(
            normalize_arxiv_id("http://arxiv.org/abs/hep-th/9901001v1"),
            Some("hep-th/9901001".to_string())
        );
        assert_eq!(
            normalize_arxiv_id("arXiv:solv-int/9901001"),
            Some("solv-int/9901001".to_string())
        );
        assert_eq!(normalize_arxiv_id("not an id"), None);
    }

    #[test]
    fn test_canonical_ids_are_scheme_scoped() {
        assert_eq!(canonical_id("12345", "pubmed"), Some("pmid:12345".to_string()));
        assert_eq!(canonical_id("PMID:12345", "semantic_scholar"), Some("pmid:12345".to_string()));
        assert_eq!(
            canonical_id("12345", "semantic_scholar"),
            Some("semantic_scholar:12345".to_string())
        );
        assert_eq!(canonical_id("  ", "pubmed"), None);
    }

    #[test]
    fn test_duplicate_by_doi_case_insensitive() {
        let a = paper("10.1000/ABC", "First title", SourceType::BioRxiv).build();
        let b = paper("s2id", "Completely different", SourceType::SemanticScholar)
            .doi("https://doi.org/10.1000/abc")
            .build();
        assert!(are_duplicates(&a, &b));
    }

    #[test]
    fn test_duplicate_by_title_needs_author_overlap() {
        let a = paper("1", "Deep Learning for Protein Folding", SourceType::PubMed)
            .authors(["Jane Smith", "Bob Jones"])
            .build();
        let b = paper("2", "Deep learning for protein folding.", SourceType::Arxiv)
            .authors(["Smith, J.", "Alice Wu"])
            .build();
        let c = paper("3", "Deep learning for protein folding", SourceType::Arxiv)
            .authors(["Alice Wu"])
            .build();
        let d = paper("4", "Deep learning for protein folding", SourceType::Arxiv).build();

        assert!(are_duplicates(&a, &b));
        assert!(!are_duplicates(&a, &c));
        assert!(!are_duplicates(&a, &d));
    }

    #[test]
    fn test_no_duplicates_different_titles() {
        let a = paper("1", "Quantum error correction", SourceType::Arxiv)
            .authors(["Jane Smith"])
            .build();
        let b = paper("2", "Bacterial immunity in the gut", SourceType::PubMed)
            .authors(["Jane Smith"])
            .build();
        assert!(!are_duplicates(&a, &b));
    }

    #[test]
    fn test_same_identifier_different_sources_not_merged() {
        let a = paper("204", "Alpha", SourceType::SemanticScholar).build();
        let b = paper("204", "Beta", SourceType::Other("openalex".into())).build();
        assert!(!are_duplicates(&a, &b));
    }

    #[test]
    fn test_groups_are_transitive() {
        let papers = vec![
            paper("10.1/x", "A", SourceType::BioRxiv).build(),
            paper("unrelated", "Something else", SourceType::Arxiv).build(),
            paper("s2", "A renamed", SourceType::SemanticScholar)
                .doi("10.1/x")
                .authors(["Kim Lee"])
                .build(),
            paper("pm", "A renamed", SourceType::PubMed)
                .authors(["Lee, K."])
                .build(),
        ];
        let groups = find_duplicate_groups(&papers);
        assert_eq!(groups, vec![vec![0, 2, 3], vec![1]]);
    }

    #[test]
    fn test_richer_record_survives() {
        let sparse = paper("10.1/x", "Title", SourceType::BioRxiv).build();
        let rich = paper("s2", "Other title", SourceType::SemanticScholar)
            .doi("10.1/x")
            .authors(["A B"])
            .abstract_text("abstract")
            .citations(10)
            .build();
        let papers = vec![sparse, rich];
        let groups = find_duplicate_groups(&papers);
        assert_eq!(groups, vec![vec![0, 1]]);
        assert_eq!(pick_survivor(&papers, &groups[0]), 1);
    }

    #[test]
    fn test_tie_keeps_first() {
        let papers = vec![
            paper("10.1/x", "One", SourceType::BioRxiv).build(),
            paper("10.1/X", "Two", SourceType::MedRxiv).build(),
        ];
        let groups = find_duplicate_groups(&papers);
        assert_eq!(pick_survivor(&papers, &groups[0]), 0);
    }

    #[test]
    fn test_groups_empty_and_single() {
        assert!(find_duplicate_groups(&[]).is_empty());
        let single = vec![paper("1", "Only", SourceType::Arxiv).build()];
        assert_eq!(find_duplicate_groups(&single), vec![vec![0]]);
    }
}
