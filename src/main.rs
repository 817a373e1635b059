use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use research_atlas::citation::{ComparisonAspect, ComparisonReport, ImpactReport, Recommendation, Strategy};
use research_atlas::config::{get_config, load_config, Config};
use research_atlas::models::{CitationGraph, Expansion, PaperRecord, SearchFilters};
use research_atlas::search::{SearchReport, SourceOutcome};
use research_atlas::service::SourceInfo;
use research_atlas::ResearchService;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Research Atlas - Search scholarly sources at once and explore citation networks
#[derive(Parser, Debug)]
#[command(name = "research-atlas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search scholarly sources concurrently and analyze citation networks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-source timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for papers by keywords
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Source name, or "all"
        #[arg(long, short, default_value = "all")]
        source: String,

        /// Maximum number of results per source
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Search with field filters
    #[command(alias = "a")]
    Advanced {
        /// Free-text term matched across all fields
        #[arg(long)]
        term: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        journal: Option<String>,

        /// Earliest publication date (YYYY-MM-DD or YYYY/MM/DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Latest publication date (YYYY-MM-DD or YYYY/MM/DD)
        #[arg(long)]
        end_date: Option<String>,

        /// Source name, or "all"
        #[arg(long, short, default_value = "all")]
        source: String,

        /// Maximum number of results per source
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Fetch the full record of one paper
    #[command(alias = "m")]
    Metadata {
        /// Paper ID (source-specific identifier)
        paper_id: String,

        #[arg(long, short)]
        source: String,
    },

    /// Download a paper's PDF
    #[command(alias = "d")]
    Download {
        /// Paper ID (source-specific identifier)
        paper_id: String,

        #[arg(long, short)]
        source: String,

        /// Path where to save the PDF (default: the configured download directory)
        #[arg(long)]
        output_path: Option<PathBuf>,
    },

    /// List registered sources
    Sources {
        /// Show capabilities of each source
        #[arg(long)]
        detailed: bool,
    },

    /// Build the citation network around a paper
    #[command(alias = "n")]
    Network {
        paper_id: String,

        /// Source with citation data (default: from config)
        #[arg(long, short)]
        source: Option<String>,

        /// Traversal depth, 1 to 3 (default: from config)
        #[arg(long, short)]
        depth: Option<u8>,
    },

    /// Recommend papers related to a paper
    #[command(alias = "r")]
    Recommend {
        paper_id: String,

        #[arg(long, short)]
        source: Option<String>,

        #[arg(long, short, default_value_t = 10)]
        count: usize,

        /// citations, similar, influential or comprehensive
        #[arg(long, default_value_t = Strategy::Comprehensive)]
        strategy: Strategy,
    },

    /// Assess the citation impact of a paper
    Impact {
        paper_id: String,

        #[arg(long, short)]
        source: Option<String>,
    },

    /// Compare two to five papers side by side
    Compare {
        #[arg(required = true, num_args = 2..=5)]
        paper_ids: Vec<String>,

        #[arg(long, short)]
        source: Option<String>,

        /// Comma-separated: impact, timeline, fields (default: all)
        #[arg(long, short, value_delimiter = ',')]
        aspects: Vec<ComparisonAspect>,
    },
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("research_atlas={}", level)),
    );

    // Logs go to stderr so JSON on stdout stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format.as_deref() == Some("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => get_config().context("Failed to load configuration")?,
    };
    if let Some(secs) = cli.timeout {
        config.search.source_timeout_secs = secs.max(1);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load(&cli)?;
    init_tracing(&cli, &config);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let service = ResearchService::from_config(&config)?;
    let format = cli.output.resolve();
    let citation_source = |source: Option<String>| {
        source.unwrap_or_else(|| config.citations.default_source.clone())
    };

    match command {
        Commands::Search {
            query,
            source,
            limit,
        } => {
            let limit = limit.unwrap_or(config.search.default_limit);
            let report = service.search(&query, &source, limit).await?;
            output_report(&report, format, cli.quiet)?;
        }

        Commands::Advanced {
            term,
            title,
            author,
            journal,
            start_date,
            end_date,
            source,
            limit,
        } => {
            let filters = SearchFilters {
                title,
                author,
                journal,
                start_date,
                end_date,
                term,
            };
            let limit = limit.unwrap_or(config.search.default_limit);
            let report = service.search_advanced(filters, &source, limit).await?;
            output_report(&report, format, cli.quiet)?;
        }

        Commands::Metadata { paper_id, source } => {
            let paper = service.get_metadata(&paper_id, &source).await?;
            output_papers(std::slice::from_ref(&paper), format)?;
        }

        Commands::Download {
            paper_id,
            source,
            output_path,
        } => {
            let bytes = service.download_pdf(&paper_id, &source).await?;
            let path = output_path
                .unwrap_or_else(|| config.downloads.target_path(&source, &paper_id));
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;

            if !cli.quiet {
                println!("Saved {} bytes to {}", bytes.len(), path.display());
            }
        }

        Commands::Sources { detailed } => {
            output_sources(&service.describe_sources(), detailed, format)?;
        }

        Commands::Network {
            paper_id,
            source,
            depth,
        } => {
            let source = citation_source(source);
            let depth = depth.unwrap_or(config.citations.default_depth);
            let graph = service
                .analyze_citation_network(&paper_id, &source, depth)
                .await?;
            output_graph(&graph, format)?;
        }

        Commands::Recommend {
            paper_id,
            source,
            count,
            strategy,
        } => {
            let source = citation_source(source);
            let recommendations = service
                .recommend_related(&paper_id, &source, count, strategy)
                .await?;
            output_recommendations(&recommendations, format)?;
        }

        Commands::Impact { paper_id, source } => {
            let source = citation_source(source);
            let report = service.evaluate_impact(&paper_id, &source).await?;
            output_impact(&report, format)?;
        }

        Commands::Compare {
            paper_ids,
            source,
            aspects,
        } => {
            let source = citation_source(source);
            let report = service.compare_papers(&paper_ids, &source, &aspects).await?;
            output_comparison(&report, format)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table(header: Vec<&str>) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(header);
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn authors_line(paper: &PaperRecord) -> String {
    match paper.authors.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, ..] => format!("{first} et al."),
    }
}

fn year(paper: &PaperRecord) -> String {
    paper
        .published
        .map(|d| d.format("%Y").to_string())
        .unwrap_or_default()
}

fn output_report(report: &SearchReport, format: OutputFormat, quiet: bool) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    output_papers(&report.papers, format)?;
    if quiet {
        return Ok(());
    }

    for status in &report.statuses {
        match &status.outcome {
            SourceOutcome::Succeeded {
                count,
                relaxed_filters,
            } => {
                let note = if *relaxed_filters { " (journal filter dropped)" } else { "" };
                eprintln!(
                    "  {}: {} results in {} ms{}",
                    status.source, count, status.elapsed_ms, note
                );
            }
            SourceOutcome::Failed { reason, message } => {
                eprintln!("  {}: failed ({:?}) {}", status.source, reason, message);
            }
        }
    }
    Ok(())
}

fn output_papers(papers: &[PaperRecord], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(papers);
    }

    use comfy_table::{Attribute, Cell};
    let mut table = new_table(vec!["Title", "Authors", "Source", "Year", "ID"]);
    for paper in papers {
        table.add_row(vec![
            Cell::new(truncate(&paper.title, 60)).add_attribute(Attribute::Bold),
            Cell::new(truncate(&authors_line(paper), 30)),
            Cell::new(paper.source.name()),
            Cell::new(year(paper)),
            Cell::new(&paper.identifier),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn output_sources(sources: &[SourceInfo], detailed: bool, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(sources);
    }
    if !detailed {
        for source in sources {
            println!("{}", source.name);
        }
        return Ok(());
    }

    let mut table = new_table(vec!["Source", "Name", "Capabilities"]);
    for source in sources {
        table.add_row(vec![
            source.name.clone(),
            source.display_name.clone(),
            source.capabilities.join(", "),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn output_graph(graph: &CitationGraph, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(graph);
    }

    println!(
        "Citation network for {}: {} papers, {} links ({:?})",
        graph.seed,
        graph.node_count(),
        graph.edge_count(),
        graph.state
    );

    let mut table = new_table(vec!["Depth", "Title", "Citations", "Links", "Impact", "Note"]);
    for node in graph.nodes() {
        let note = match &node.expansion {
            Expansion::Leaf { reason } => truncate(reason, 30),
            _ => String::new(),
        };
        table.add_row(vec![
            node.depth.to_string(),
            truncate(&node.record.title, 60),
            node.record
                .citation_count()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            node.in_degree.to_string(),
            format!("{:.1}", node.impact_score),
            note,
        ]);
    }
    println!("{table}");
    Ok(())
}

fn output_recommendations(recommendations: &[Recommendation], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(recommendations);
    }

    let mut table = new_table(vec!["Score", "Title", "Year", "Depth", "ID"]);
    for rec in recommendations {
        table.add_row(vec![
            format!("{:.3}", rec.score),
            truncate(&rec.paper.title, 60),
            year(&rec.paper),
            rec.depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "suggested".to_string()),
            rec.paper.identifier.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn output_impact(report: &ImpactReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let mut table = new_table(vec!["Metric", "Value"]);
    table.add_row(vec!["Paper".to_string(), truncate(&report.title, 60)]);
    table.add_row(vec!["Citations".to_string(), report.citation_count.to_string()]);
    table.add_row(vec![
        "Influential citations".to_string(),
        report.influential_citation_count.to_string(),
    ]);
    table.add_row(vec![
        "Citations per year".to_string(),
        format!("{:.1}", report.citation_velocity),
    ]);
    table.add_row(vec!["Score".to_string(), format!("{:.1}", report.score)]);
    table.add_row(vec!["Level".to_string(), format!("{:?}", report.level)]);
    if !report.fields_of_study.is_empty() {
        table.add_row(vec!["Fields".to_string(), report.fields_of_study.join(", ")]);
    }
    println!("{table}");

    for insight in &report.insights {
        println!("  * {insight}");
    }
    Ok(())
}

fn output_comparison(report: &ComparisonReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let mut table = new_table(vec!["ID", "Title", "Year", "Citations"]);
    for paper in &report.papers {
        table.add_row(vec![
            paper.identifier.clone(),
            truncate(&paper.title, 60),
            year(paper),
            paper
                .citation_count()
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
        ]);
    }
    println!("{table}");

    if let Some(impact) = &report.impact {
        println!(
            "Citations: {} to {} (range {}); most cited: {}",
            impact.lowest_cited,
            impact.highest_cited,
            impact.citation_range,
            truncate(&impact.most_cited_title, 60)
        );
    }
    if let Some(timeline) = &report.timeline {
        if let (Some(first), Some(last)) = (timeline.earliest_year, timeline.latest_year) {
            println!("Published {first} to {last} ({} years)", timeline.time_span);
        }
    }
    if let Some(fields) = &report.fields {
        if !fields.fields.is_empty() {
            let label = if fields.interdisciplinary { " (interdisciplinary)" } else { "" };
            println!("Fields: {}{label}", fields.fields.join(", "));
        }
    }
    for failure in &report.failures {
        eprintln!("  ! {}: {}", failure.identifier, failure.error);
    }
    Ok(())
}
