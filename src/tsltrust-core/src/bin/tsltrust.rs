//! tsltrust CLI - inspect, verify and resolve trust status lists.
//!
//! Local paths and `http(s)://` URIs are accepted wherever a list is expected.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use tsltrust_core::{
    is_stale, CancellationToken, FreshnessTracker, HttpsFetcher, Language, NodeState,
    PointerResolver, SignatureVerifier, TrustConfig, TrustError, TrustStatusList, TslFetcher,
    VerificationStatus,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Inspect, verify and resolve ETSI trust status lists.
#[derive(Parser)]
#[command(name = "tsltrust")]
#[command(version = VERSION)]
#[command(about = "Trust status list parsing, verification and pointer resolution")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: Format,

    /// Preferred language for localized names
    #[arg(long, default_value = "en", global = true)]
    lang: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the scheme information of a list
    Inspect {
        /// Path or URI of the list
        source: String,

        /// Also list trust service providers
        #[arg(long)]
        providers: bool,
    },

    /// Verify the XML signature of a list
    Verify {
        /// Path or URI of the list
        source: String,

        /// Check certificate validity at this RFC 3339 time instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Print the SHA-1 content fingerprint of one or more lists
    Fingerprint {
        /// Paths or URIs
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Follow pointers from root lists and print the trust graph
    Resolve {
        /// Paths or URIs of the root lists
        #[arg(required = true)]
        roots: Vec<String>,

        /// Per-fetch timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Maximum fetches in flight
        #[arg(long, default_value = "8")]
        concurrency: usize,

        /// Maximum pointer depth
        #[arg(long, default_value = "8")]
        max_depth: usize,
    },

    /// Compare instances of a list in order and report staleness
    Freshness {
        /// Paths or URIs, oldest first
        #[arg(required = true)]
        sources: Vec<String>,

        /// Grace period past NextUpdate, in hours
        #[arg(long, default_value = "0")]
        grace_hours: u64,
    },
}

fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

async fn load_bytes(source: &str, config: &TrustConfig) -> Result<Vec<u8>, String> {
    if is_remote(source) {
        let fetcher = HttpsFetcher::new(&config.user_agent).map_err(|e| e.to_string())?;
        fetcher
            .fetch(source, config.fetch_timeout)
            .await
            .map_err(|e| format!("{source}: {e}"))
    } else {
        std::fs::read(Path::new(source)).map_err(|e| format!("{source}: {e}"))
    }
}

async fn load(source: &str, config: &TrustConfig) -> Result<TrustStatusList, String> {
    let bytes = load_bytes(source, config).await?;
    TrustStatusList::parse(&bytes).map_err(|e| format!("{source}: {e}"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

fn describe(e: TrustError) -> String {
    if e.is_cancellation() {
        "interrupted, no graph produced".to_string()
    } else {
        e.to_string()
    }
}

fn fmt_time(t: Option<DateTime<Utc>>) -> String {
    t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
}

async fn run_inspect(
    source: &str,
    providers: bool,
    lang: &Language,
    config: &TrustConfig,
    format: Format,
) -> Result<bool, String> {
    let list = load(source, config).await?;

    if format == Format::Json {
        let mut value = serde_json::json!({ "summary": list.summary(lang) });
        if providers {
            value["providers"] = serde_json::to_value(list.providers()).map_err(|e| e.to_string())?;
        }
        print_json(&value)?;
        return Ok(true);
    }

    let summary = list.summary(lang);
    println!("\nTRUST STATUS LIST");
    println!("=================\n");
    println!("  Scheme:       {}", summary.scheme_name);
    println!("  Operator:     {}", summary.scheme_operator);
    println!("  Territory:    {}", summary.territory);
    println!("  Type:         {}", summary.tsl_type);
    println!(
        "  Sequence:     {}",
        summary
            .sequence_number
            .map_or_else(|| "-".to_string(), |s| s.to_string())
    );
    println!("  Issued:       {}", fmt_time(summary.issue_date_time));
    println!("  Next update:  {}", fmt_time(summary.next_update));
    println!("  Fingerprint:  {}", summary.fingerprint);
    println!("  Signed:       {}", if summary.signed { "yes" } else { "no" });
    println!(
        "  Providers:    {} ({} services)",
        summary.provider_count, summary.service_count
    );
    println!("  Pointers:     {}", summary.pointer_count);
    if !summary.absent_fields.is_empty() {
        println!("  Absent:       {}", summary.absent_fields.join(", "));
    }

    if !list.pointers().is_empty() {
        println!("\nPOINTERS");
        for pointer in list.pointers() {
            println!(
                "  [{}] {} {}",
                pointer.territory.as_deref().unwrap_or("??"),
                pointer.operator_name(lang),
                pointer.location
            );
        }
    }

    if providers {
        println!("\nPROVIDERS");
        for provider in list.providers() {
            println!("  {}", provider.name(lang));
            for service in &provider.services {
                println!("    - {} [{}]", service.name(lang), service.status);
            }
        }
    }
    println!();
    Ok(true)
}

async fn run_verify(
    source: &str,
    at: Option<DateTime<Utc>>,
    config: &TrustConfig,
    format: Format,
) -> Result<bool, String> {
    let bytes = load_bytes(source, config).await?;
    let verifier = at.map_or_else(SignatureVerifier::new, SignatureVerifier::at);
    let result = verifier.verify(&bytes);

    if format == Format::Json {
        print_json(&result)?;
    } else {
        let label = match result.status {
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::Failed => "FAILED",
            VerificationStatus::NotSigned => "NOT SIGNED",
        };
        println!("\nSIGNATURE: {label}");
        println!("  Reason:     {}", result.reason);
        if let Some(algorithm) = &result.algorithm {
            println!("  Algorithm:  {algorithm}");
        }
        if let Some(signer) = &result.signer {
            println!("  Subject:    {}", signer.subject);
            println!("  Issuer:     {}", signer.issuer);
            println!("  Serial:     {}", signer.serial_hex);
            println!(
                "  Valid:      {} .. {}",
                signer.not_before.to_rfc3339(),
                signer.not_after.to_rfc3339()
            );
            println!("  SHA-256:    {}", signer.certificate_sha256);
        }
        println!("  Checked at: {}\n", result.checked_at.to_rfc3339());
    }
    Ok(result.status != VerificationStatus::Failed)
}

async fn run_fingerprint(
    sources: &[String],
    config: &TrustConfig,
    format: Format,
) -> Result<bool, String> {
    let loaded = futures::future::join_all(sources.iter().map(|s| load_bytes(s, config))).await;

    let mut rows = Vec::with_capacity(sources.len());
    for (source, bytes) in sources.iter().zip(loaded) {
        let list = TrustStatusList::parse(&bytes?).map_err(|e| format!("{source}: {e}"))?;
        if format == Format::Text {
            println!("{}  {}", list.fingerprint(), source);
        }
        rows.push(serde_json::json!({
            "source": source,
            "fingerprint": list.fingerprint(),
        }));
    }
    if format == Format::Json {
        print_json(&rows)?;
    }
    Ok(true)
}

async fn run_resolve(roots: &[String], config: TrustConfig, format: Format) -> Result<bool, String> {
    let fetcher = HttpsFetcher::new(&config.user_agent).map_err(|e| e.to_string())?;
    let mut lists = Vec::new();
    let mut uris = Vec::new();
    for root in roots {
        if is_remote(root) {
            uris.push(root.clone());
        } else {
            lists.push(load(root, &config).await?);
        }
    }

    let lang = config.language().map_err(|e| e.to_string())?;
    let resolver = PointerResolver::new(Arc::new(fetcher), config).map_err(|e| e.to_string())?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    // Local roots first; remote roots are resolved as a second graph.
    let mut graphs = Vec::new();
    if !lists.is_empty() {
        graphs.push(resolver.resolve(lists, &cancel).await.map_err(describe)?);
    }
    if !uris.is_empty() {
        graphs.push(
            resolver
                .resolve_uris(&uris, &cancel)
                .await
                .map_err(describe)?,
        );
    }

    if format == Format::Json {
        let value: Vec<_> = graphs
            .iter()
            .map(|g| serde_json::json!({ "summary": g.summary(), "graph": g }))
            .collect();
        print_json(&value)?;
        return Ok(true);
    }

    for graph in &graphs {
        let summary = graph.summary();
        println!("\nTRUST GRAPH");
        println!("===========\n");
        println!(
            "  {} nodes ({} verified), {} edges",
            summary.nodes, summary.verified_nodes, summary.edges
        );
        for (status, count) in &summary.edge_status {
            println!("    {status}: {count}");
        }

        println!("\nNODES");
        for node in graph.nodes() {
            let detail = match (node.list(), node.verification()) {
                (Some(list), Some(v)) => format!(
                    "{} {} [{:?}]",
                    list.scheme_territory(),
                    list.scheme_operator_name(&lang),
                    v.status
                ),
                _ => match &node.state {
                    NodeState::Unparsable { reason } => format!("unparsable: {reason}"),
                    NodeState::Unreachable { reason } => {
                        format!("unreachable: {reason}")
                    },
                    NodeState::Parsed { .. } => String::new(),
                },
            };
            println!("  {} (depth {}) {}", node.key, node.depth, detail);
        }

        println!("\nEDGES");
        for edge in graph.edges() {
            println!("  {} -> {} [{}]", edge.from, edge.uri, edge.status.label());
        }
        println!();
    }
    Ok(true)
}

async fn run_freshness(
    sources: &[String],
    grace: Duration,
    config: &TrustConfig,
    format: Format,
) -> Result<bool, String> {
    let tracker = FreshnessTracker::new();
    let now = config.verification_time.unwrap_or_else(Utc::now);
    let mut rows = Vec::new();
    let mut clean = true;

    for source in sources {
        let list = load(source, config).await?;
        let stale = is_stale(&list, now, grace);
        let sequence = list.sequence_number();
        let territory = list.scheme_territory().to_string();
        let report = tracker.observe(list);
        clean &= report.is_acceptable();

        if format == Format::Text {
            let stale_label = if stale { " (stale)" } else { "" };
            match report.clone().into_result() {
                Ok(r) => println!("{source}: {territory} seq {sequence:?} {r:?}{stale_label}"),
                Err(e) => println!("{source}: {e}{stale_label}"),
            }
        }
        rows.push(serde_json::json!({
            "source": source,
            "sequence_number": sequence,
            "stale": stale,
            "report": report,
        }));
    }

    if format == Format::Json {
        print_json(&rows)?;
    }
    Ok(clean)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging (quiet for JSON output)
    if cli.format == Format::Json {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = TrustConfig {
        preferred_language: cli.lang.clone(),
        ..TrustConfig::default()
    };
    let lang = match config.language() {
        Ok(lang) => lang,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        },
    };

    let outcome = match cli.command {
        Commands::Inspect { source, providers } => {
            run_inspect(&source, providers, &lang, &config, cli.format).await
        },
        Commands::Verify { source, at } => run_verify(&source, at, &config, cli.format).await,
        Commands::Fingerprint { sources } => run_fingerprint(&sources, &config, cli.format).await,
        Commands::Resolve {
            roots,
            timeout,
            concurrency,
            max_depth,
        } => {
            config.fetch_timeout = Duration::from_secs(timeout);
            config.max_concurrent_fetches = concurrency;
            config.max_depth = max_depth;
            if let Err(e) = config.validate() {
                eprintln!("error: {e}");
                return ExitCode::from(2);
            }
            run_resolve(&roots, config, cli.format).await
        },
        Commands::Freshness {
            sources,
            grace_hours,
        } => {
            let grace = Duration::from_secs(grace_hours.saturating_mul(3600));
            run_freshness(&sources, grace, &config, cli.format).await
        },
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(message) => {
            warn!(error = %message, "Command failed");
            eprintln!("error: {message}");
            ExitCode::from(2)
        },
    }
}
