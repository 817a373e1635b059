//! Integration tests for Research Atlas
//!
//! These drive the public service surface end to end against in-memory
//! sources (and one mocked HTTP provider), so they run without network access.

use research_atlas::config::Config;
use research_atlas::models::{GraphState, PaperBuilder, PaperRecord, SearchFilters, SourceType};
use research_atlas::search::{FailureReason, FanOut, ResultMerger, SourceBatch};
use research_atlas::sources::{make_paper, AdapterRegistry, MockSource, SourceError};
use research_atlas::{ResearchError, ResearchService};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn service_with(sources: Vec<MockSource>, timeout_secs: u64) -> ResearchService {
    let registry = sources
        .into_iter()
        .fold(AdapterRegistry::builder(), |builder, source| {
            builder.register(Arc::new(source))
        })
        .build();
    let mut config = Config::default();
    config.search.source_timeout_secs = timeout_secs;
    ResearchService::new(Arc::new(registry), &config)
}

fn paper(id: &str, title: &str, source: &str) -> PaperRecord {
    PaperBuilder::new(id, title, format!("https://example.org/{id}"), SourceType::from_id(source))
        .authors(["Jennifer Doudna"])
        .build()
}

#[tokio::test]
async fn test_every_source_reports_a_status() {
    let svc = service_with(
        vec![
            MockSource::new("pubmed").with_results(vec![paper("1", "Base editing in mice", "pubmed")]),
            MockSource::new("arxiv").failing(SourceError::ProviderRateLimited("429".into())),
            MockSource::new("biorxiv").with_results(Vec::new()),
        ],
        30,
    );

    let report = svc.search("base editing", "all", 10).await.unwrap();

    let names: Vec<&str> = report.statuses.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(names, vec!["pubmed", "arxiv", "biorxiv"]);
    assert_eq!(
        report.statuses[1].failure_reason(),
        Some(FailureReason::ProviderRateLimited)
    );
    assert!(report.statuses[2].is_success());
    assert_eq!(report.papers.len(), 1);
}

#[tokio::test]
async fn test_all_sources_failing_is_still_a_result() {
    let svc = service_with(
        vec![
            MockSource::new("a").failing(SourceError::ProviderUnavailable("down".into())),
            MockSource::new("b").failing(SourceError::ProviderUnavailable("down".into())),
        ],
        30,
    );

    let report = svc.search("anything", "all", 10).await.unwrap();
    assert!(report.papers.is_empty());
    assert_eq!(report.failed_sources().count(), 2);
}

#[tokio::test]
async fn test_crispr_search_with_one_slow_source() {
    let svc = service_with(
        vec![
            MockSource::new("pubmed").with_results(vec![
                paper("p1", "CRISPR-Cas9 gene editing in human embryos", "pubmed"),
                paper("p2", "Off-target effects of CRISPR nucleases", "pubmed"),
            ]),
            MockSource::new("arxiv").with_results(vec![paper(
                "2401.00001",
                "Machine learning guide design for CRISPR screens",
                "arxiv",
            )]),
            MockSource::new("semantic_scholar")
                .with_results(vec![paper("s1", "Never delivered", "semantic_scholar")])
                .with_latency(Duration::from_secs(5)),
        ],
        1,
    );

    let started = std::time::Instant::now();
    let report = svc.search("CRISPR gene editing", "all", 10).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(report.papers.len(), 3);
    assert!(report.papers.iter().all(|p| p.identifier != "s1"));
    // Round-robin across sources in dispatch order
    assert_eq!(report.papers[0].identifier, "p1");
    assert_eq!(report.papers[1].identifier, "2401.00001");

    assert_eq!(report.statuses.len(), 3);
    assert_eq!(report.statuses[2].failure_reason(), Some(FailureReason::Timeout));
}

#[tokio::test]
async fn test_same_doi_different_titles_merge_to_richer_record() {
    let sparse = PaperBuilder::new("38000001", "CRISPR base editing", "https://pubmed.example/1", SourceType::PubMed)
        .doi("10.1038/s41586-024-00001-x")
        .build();
    let rich = PaperBuilder::new("abc123", "Base editing with CRISPR: a review", "https://s2.example/abc123", SourceType::SemanticScholar)
        .doi("https://doi.org/10.1038/S41586-024-00001-X")
        .authors(["David Liu", "Andrew Anzalone"])
        .abstract_text("Base editors enable precise single-nucleotide changes.")
        .venue("Nature")
        .published_date("2024-03-01")
        .build();

    let svc = service_with(
        vec![
            MockSource::new("pubmed").with_results(vec![sparse]),
            MockSource::new("semantic_scholar").with_results(vec![rich]),
        ],
        30,
    );

    let report = svc.search("base editing", "all", 10).await.unwrap();
    assert_eq!(report.papers.len(), 1);
    assert_eq!(report.papers[0].identifier, "abc123");
    assert_eq!(report.papers[0].venue.as_deref(), Some("Nature"));
}

#[tokio::test]
async fn test_merging_is_idempotent() {
    let svc = service_with(
        vec![
            MockSource::new("pubmed").with_results(vec![
                paper("1", "Prime editing of human cells", "pubmed"),
                paper("2", "Epigenome editing with dCas9", "pubmed"),
            ]),
            MockSource::new("biorxiv").with_results(vec![
                paper("10.1101/2024.01.01.000001", "Prime editing of human cells", "biorxiv"),
            ]),
        ],
        30,
    );

    let report = svc.search("editing", "all", 10).await.unwrap();
    assert_eq!(report.papers.len(), 2);

    let again = ResultMerger::new().merge(
        FanOut {
            batches: vec![SourceBatch {
                source: "merged".to_string(),
                papers: report.papers.clone(),
            }],
            statuses: report.statuses.clone(),
        },
        report.ranking,
    );
    let first: Vec<_> = report.papers.iter().map(|p| p.key()).collect();
    let second: Vec<_> = again.papers.iter().map(|p| p.key()).collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_date_bounded_filter_search_is_newest_first() {
    let dated = |id: &str, date: &str| {
        PaperBuilder::new(id, format!("Study {id} on gene drives"), "https://x", SourceType::from_id("mock"))
            .published_date(date)
            .build()
    };
    let svc = service_with(
        vec![MockSource::new("mock").with_results(vec![
            dated("old", "2020-05-01"),
            dated("new", "2024-02-01"),
            dated("mid", "2022-07-01"),
        ])],
        30,
    );

    let filters = SearchFilters::new().title("gene drives").start_date("2019-01-01");
    let report = svc.search_advanced(filters, "mock", 10).await.unwrap();
    let ids: Vec<&str> = report.papers.iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
}

#[tokio::test]
async fn test_invalid_requests_fail_before_dispatch() {
    let source = Arc::new(MockSource::new("mock"));
    let registry = AdapterRegistry::builder().register(source.clone()).build();
    let svc = ResearchService::new(Arc::new(registry), &Config::default());

    assert!(matches!(
        svc.search_advanced(SearchFilters::new(), "all", 10).await,
        Err(ResearchError::InvalidQuery(_))
    ));
    assert!(matches!(
        svc.search_advanced(SearchFilters::new().start_date("2024/13/45"), "all", 10).await,
        Err(ResearchError::InvalidQuery(_))
    ));
    assert!(matches!(
        svc.search("crispr", "scopus", 10).await,
        Err(ResearchError::UnknownSource { .. })
    ));
    assert_eq!(source.call_count(), 0);
}

#[cfg(feature = "source-pubmed")]
#[tokio::test]
async fn test_pubmed_open_ended_start_date() {
    use mockito::Matcher;
    use research_atlas::sources::PubMedSource;

    let mut server = mockito::Server::new_async().await;
    let esearch = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded(
            "term".into(),
            "CRISPR[Title] AND 2024/01/01:3000/12/31[Date - Publication]".into(),
        ))
        .with_status(200)
        .with_body("<eSearchResult><Count>0</Count><IdList/></eSearchResult>")
        .create_async()
        .await;

    let pubmed = PubMedSource::new(None).unwrap().with_base_url(server.url());
    let registry = AdapterRegistry::builder().register(Arc::new(pubmed)).build();
    let svc = ResearchService::new(Arc::new(registry), &Config::default());

    let filters = SearchFilters::new().title("CRISPR").start_date("2024/01/01");
    let report = svc.search_advanced(filters, "pubmed", 10).await.unwrap();

    assert!(report.papers.is_empty());
    assert!(report.statuses[0].is_success());
    esearch.assert_async().await;
}

#[cfg(feature = "source-pubmed")]
#[tokio::test]
async fn test_stalled_provider_is_reported_as_timeout() {
    use research_atlas::sources::PubMedSource;
    use tokio::net::TcpListener;

    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stalled = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });

    let pubmed = PubMedSource::new(None).unwrap().with_base_url(format!("http://{addr}"));
    let registry = AdapterRegistry::builder().register(Arc::new(pubmed)).build();
    let mut config = Config::default();
    config.search.source_timeout_secs = 1;
    let svc = ResearchService::new(Arc::new(registry), &config);

    let report = svc.search("crispr", "pubmed", 5).await.unwrap();
    assert_eq!(report.statuses[0].failure_reason(), Some(FailureReason::Timeout));

    assert!(matches!(
        svc.get_metadata("38000001", "pubmed").await,
        Err(ResearchError::Timeout { .. })
    ));
    stalled.abort();
}

#[cfg(feature = "source-pubmed")]
#[tokio::test]
async fn test_unresolvable_pubmed_identifier_is_not_found() {
    use research_atlas::sources::PubMedSource;

    let pubmed = PubMedSource::new(None).unwrap().with_base_url("http://127.0.0.1:9");
    let registry = AdapterRegistry::builder().register(Arc::new(pubmed)).build();
    let svc = ResearchService::new(Arc::new(registry), &Config::default());

    assert!(matches!(
        svc.get_metadata("doi-not-pmid", "pubmed").await,
        Err(ResearchError::NotFound(_))
    ));
}

fn graph_source() -> MockSource {
    let p = |id: &str| make_paper(id, &format!("Paper {id}"), "mock");
    MockSource::new("mock")
        .with_metadata(p("seed"))
        // "shared" both cites the seed and is cited by it
        .with_cited_by("seed", vec![p("shared"), p("a")])
        .with_references("seed", vec![p("shared"), p("r")])
        .with_cited_by("a", vec![p("a2")])
        .with_cited_by("a2", vec![p("a3")])
        .with_references("r", vec![p("shared")])
}

#[tokio::test]
async fn test_shared_paper_appears_once_at_depth_one() {
    let svc = service_with(vec![graph_source()], 30);

    let graph = svc.analyze_citation_network("seed", "mock", 2).await.unwrap();

    let shared: Vec<_> = graph
        .nodes()
        .iter()
        .filter(|n| n.record.identifier == "shared")
        .collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].depth, 1);

    let keys: HashSet<_> = graph.nodes().iter().map(|n| n.key()).collect();
    assert_eq!(keys.len(), graph.node_count());
    assert!(graph.nodes().iter().all(|n| n.depth <= 2));
    assert!(graph.nodes().iter().all(|n| n.record.identifier != "a3"));
    assert_eq!(graph.state, GraphState::Bounded);
}

#[tokio::test]
async fn test_depth_one_stops_at_direct_neighbors() {
    let svc = service_with(vec![graph_source()], 30);

    let graph = svc.analyze_citation_network("seed", "mock", 1).await.unwrap();
    let mut ids: Vec<&str> = graph.nodes().iter().map(|n| n.record.identifier.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a", "r", "seed", "shared"]);

    assert!(matches!(
        svc.analyze_citation_network("seed", "mock", 4).await,
        Err(ResearchError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_network_completes_when_frontier_empties() {
    let p = |id: &str| make_paper(id, &format!("Paper {id}"), "mock");
    let source = MockSource::new("mock")
        .with_metadata(p("seed"))
        .with_cited_by("seed", vec![p("x")]);
    let svc = service_with(vec![source], 30);

    let graph = svc.analyze_citation_network("seed", "mock", 3).await.unwrap();
    assert_eq!(graph.state, GraphState::Complete);
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
}
