use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use vast_analyzer::{analyze_document, AdDocument, AdTagError, AdTagResult, Analyzer, ResolveOptions};

/// Resolve VAST ad tags and classify VPAID delivery and skippability
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr (repeat for more detail); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an ad tag URL through its wrappers and classify the ad
    Analyze {
        /// The ad tag URL
        #[arg(short, long)]
        url: String,

        #[command(flatten)]
        resolve: ResolveArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Classify a local VAST file without following wrappers
    Inspect {
        /// Path to the VAST file (a file:// URL is accepted too)
        #[arg(short, long)]
        input: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Analyze every ad tag URL listed in a file, one per line
    Batch {
        /// File with one URL per line; blank lines and lines starting with # are skipped
        #[arg(short, long)]
        input: PathBuf,

        /// Maximum number of tags analyzed at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        #[command(flatten)]
        resolve: ResolveArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct ResolveArgs {
    /// Maximum number of wrappers to unwrap
    #[arg(long, default_value_t = vast_analyzer::config::DEFAULT_MAX_WRAPPER_DEPTH)]
    max_wrapper_depth: usize,

    /// Maximum number of HTTP redirects per request
    #[arg(long, default_value_t = vast_analyzer::config::DEFAULT_REDIRECT_BUDGET)]
    redirect_budget: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 3)]
    timeout_secs: u64,
}

impl ResolveArgs {
    fn options(&self) -> ResolveOptions {
        ResolveOptions::new()
            .max_wrapper_depth(self.max_wrapper_depth)
            .redirect_budget(self.redirect_budget)
            .timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Pretty print JSON output
    #[arg(short, long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Analyze { url, resolve, output } => {
            let analyzer = Analyzer::new(resolve.options())?;
            let outcome = analyzer.analyze(url).await;
            Ok(exit_code(report(url, &outcome, output)?))
        }
        Commands::Inspect { input, output } => {
            let path = local_path(input);
            let content = tokio::fs::read_to_string(&path).await?;
            let document = AdDocument::parse(&content)?;
            let outcome = analyze_document(document, input);
            Ok(exit_code(report(input, &outcome, output)?))
        }
        Commands::Batch { input, concurrency, resolve, output } => {
            let content = tokio::fs::read_to_string(input).await?;
            let urls = tag_urls(&content);

            let analyzer = Arc::new(Analyzer::new(resolve.options())?);
            let mut all_ok = true;
            for (url, outcome) in analyzer.analyze_batch(urls, *concurrency).await {
                all_ok &= report(&url, &outcome, output)?;
            }
            Ok(exit_code(all_ok))
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Also routes `log` records from the library through the subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Strip a `file://` prefix, as ad tag lists often carry local fixtures that way
fn local_path(input: &str) -> PathBuf {
    let path = input.strip_prefix("file://").unwrap_or(input);

    #[cfg(target_os = "windows")]
    let path = path.trim_start_matches('/');

    Path::new(path).to_path_buf()
}

/// Ad tag URLs from a batch file, skipping blank lines and `#` comments
fn tag_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Print one outcome; returns whether the analysis succeeded
fn report(
    source: &str,
    outcome: &Result<AdTagResult, AdTagError>,
    output: &OutputArgs,
) -> Result<bool, Box<dyn std::error::Error>> {
    if output.json {
        let value = match outcome {
            Ok(result) => serde_json::to_value(result)?,
            Err(err) => serde_json::json!({
                "url": source,
                "error": err,
                "message": err.to_string(),
            }),
        };
        if output.pretty {
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", value);
        }
    } else {
        match outcome {
            Ok(result) => print_summary(result),
            Err(err) => {
                let origin = if err.is_upstream() { "wrapper chain" } else { "ad tag" };
                eprintln!("{}: {} error: {}", source, origin, err);
            }
        }
    }

    Ok(outcome.is_ok())
}

fn print_summary(result: &AdTagResult) {
    println!("{}", result.url);
    println!("  version:      {}", result.version);
    println!("  vpaid_status: {}", result.vpaid_status);
    println!("  skippable:    {}", result.skippable);
    println!("  media files:  {}", result.media_entries.len());
    if result.wrapper_depth > 0 {
        println!(
            "  wrappers:     {} ({})",
            result.wrapper_depth,
            result.wrapper_chain.join(" -> ")
        );
    }
    if let Some(target) = &result.wrapper_target {
        println!("  wraps:        {}", target);
    }
    for warning in &result.warnings {
        println!("  warning:      {}", warning);
    }
}
