//! CLI binary for pdf-parser-pro.
//!
//! A thin shim over the library crate: `serve` runs the HTTP server,
//! `parse` runs the pipeline once on a local file.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf_parser_pro::{
    parse, AppState, KeyStore, PageSelection, ParseConfig, ProviderKind, Strategy,
};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the server on the default port (8000)
  pdfpro serve

  # Run the server with Gemini as the default fallback provider
  pdfpro serve --provider gemini --port 9000

  # Parse a file, escalating low-confidence pages automatically
  pdfpro parse scanned-report.pdf

  # Library extraction only, pages 1-10, full JSON output
  pdfpro parse --strategy library --pages 1-10 --json contract.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY       OpenAI API key
  GEMINI_API_KEY       Google Gemini API key
  ANTHROPIC_API_KEY    Anthropic API key
  PORT                 Server port (serve)
  PDFIUM_LIB_PATH      Path to an existing libpdfium build
  ENVIRONMENT          Reported by /health-check/ (default: development)

A .env file in the working directory is loaded on startup.
"#;

/// Smart PDF parsing: free library extraction with AI-vision fallback.
#[derive(Parser, Debug)]
#[command(
    name = "pdfpro",
    version,
    about = "Smart PDF parsing: free library extraction with AI-vision fallback",
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFPRO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFPRO_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default when no subcommand is given).
    Serve(ServeArgs),
    /// Parse a single PDF and print the extracted text.
    Parse(ParseArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Default provider for escalated pages: openai, gemini, anthropic.
    #[arg(long, env = "PDFPRO_PROVIDER")]
    provider: Option<String>,

    /// Confidence threshold below which pages escalate (0.0–1.0).
    #[arg(long, env = "PDFPRO_THRESHOLD", default_value_t = 0.5)]
    threshold: f32,

    /// Concurrent provider calls per request.
    #[arg(long, env = "PDFPRO_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Local PDF file path.
    input: PathBuf,

    /// Dispatch strategy: auto, library, ai.
    #[arg(long, default_value = "auto")]
    strategy: String,

    /// Provider for escalated pages: openai, gemini, anthropic.
    #[arg(long, env = "PDFPRO_PROVIDER")]
    provider: Option<String>,

    /// Model ID override (provider default otherwise).
    #[arg(long, env = "PDFPRO_MODEL")]
    model: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5.
    #[arg(long, default_value = "all")]
    pages: String,

    /// Confidence threshold below which pages escalate (0.0–1.0).
    #[arg(long, env = "PDFPRO_THRESHOLD", default_value_t = 0.5)]
    threshold: f32,

    /// PDF user password for encrypted documents.
    #[arg(long)]
    password: Option<String>,

    /// Print the full result as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Command::Parse(args)) => run_parse(args).await,
        Some(Command::Serve(args)) => run_serve(args).await,
        None => run_serve(ServeArgs::default_from_env()).await,
    }
}

impl ServeArgs {
    /// Defaults for the bare `pdfpro` invocation, honouring the same env vars
    /// the flags declare.
    fn default_from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            provider: std::env::var("PDFPRO_PROVIDER").ok(),
            threshold: std::env::var("PDFPRO_THRESHOLD")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(0.5),
            concurrency: std::env::var("PDFPRO_CONCURRENCY")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(4),
        }
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut builder = ParseConfig::builder()
        .confidence_threshold(args.threshold)
        .concurrency(args.concurrency);
    if let Some(ref provider) = args.provider {
        let kind: ProviderKind = provider.parse().context("invalid --provider")?;
        builder = builder.provider_kind(kind);
    }
    let defaults = builder.build().context("invalid configuration")?;

    let keys = KeyStore::from_env();
    if keys.any_configured() {
        tracing::info!(
            "AI fallback enabled: {}",
            keys.configured()
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    } else {
        tracing::warn!("no API keys configured; running in library-only mode");
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.host, args.port))?;

    let state = AppState::new(keys, defaults);
    pdf_parser_pro::run(addr, state)
        .await
        .context("server error")?;
    Ok(())
}

async fn run_parse(args: ParseArgs) -> Result<()> {
    let strategy: Strategy = args.strategy.parse().context("invalid --strategy")?;
    let pages = PageSelection::parse(&args.pages).context("invalid --pages")?;

    let mut builder = ParseConfig::builder()
        .strategy(strategy)
        .pages(pages)
        .confidence_threshold(args.threshold);
    if let Some(ref provider) = args.provider {
        let kind: ProviderKind = provider.parse().context("invalid --provider")?;
        builder = builder.provider_kind(kind);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password);
    }
    let config = builder.build().context("invalid configuration")?;

    let output = parse(&args.input, &config)
        .await
        .context("parse failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output.text);
        eprintln!(
            "{} pages: {} library, {} ai, {} failed — {}ms, ~${:.4}",
            output.stats.selected_pages,
            output.stats.library_pages,
            output.stats.ai_pages,
            output.stats.failed_pages,
            output.stats.total_duration_ms,
            output.stats.estimated_cost_usd,
        );
    }
    Ok(())
}
