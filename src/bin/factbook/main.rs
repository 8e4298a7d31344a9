//! Energy factbook CLI - refresh sources, export website files, inspect configuration

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use energy_factbook::config::{Config, LogFormat, LoggingSettings};
use energy_factbook::db::{self, PgStore, Store};
use energy_factbook::export::filters::{self, ExportFilter};
use energy_factbook::export::{self, FileResult};
use energy_factbook::ingestion::utils::build_client;
use energy_factbook::sections::{
    find_source, Pipeline, SectionKey, SectionProcessor, Source, SourceOutcome,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "factbook", version, about = "NRCan Energy Factbook data pipeline")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch sources and store them in the database
    Refresh(RefreshArgs),
    /// Write the website CSV files
    Export(ExportArgs),
    /// Show sections, sources and export pages
    List,
    /// Check database connectivity
    TestConnection,
    /// Apply database migrations
    Migrate,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["all", "section", "source"]),
))]
struct RefreshArgs {
    /// Refresh every enabled section
    #[arg(short, long)]
    all: bool,

    /// Refresh one section, e.g. section2_investment
    #[arg(short, long)]
    section: Option<String>,

    /// Refresh one source, e.g. capital_expenditures
    #[arg(short = 'r', long)]
    source: Option<String>,

    /// Export website files once the refresh finishes
    #[arg(short, long)]
    export_after: bool,
}

#[derive(Args)]
struct ExportArgs {
    /// Only vectors written by this source
    #[arg(short, long)]
    source: Option<String>,

    /// Only vectors matching this glob, e.g. "capex_*"
    #[arg(short, long)]
    vectors: Option<String>,

    /// Only vectors read by this website page, e.g. Page24
    #[arg(short, long)]
    page: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // .env must be loaded before the config applies DB_* overrides
    dotenvy::dotenv().ok();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()));

    init_logging(
        config
            .as_ref()
            .map(|c| &c.logging)
            .unwrap_or(&LoggingSettings::default()),
    );

    let result = match config {
        Ok(config) => run(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    match settings.format {
        LogFormat::Full => builder.init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Refresh(args) => refresh(config, args).await,
        Command::Export(args) => {
            let filter = ExportFilter::new(
                args.source.as_deref(),
                args.vectors.as_deref(),
                args.page.as_deref(),
            )?;
            let store = open_store(config).await?;
            run_export(config, &store, &filter).await
        }
        Command::List => {
            list(config);
            Ok(())
        }
        Command::TestConnection => test_connection(config).await,
        Command::Migrate => {
            let store = open_store(config).await?;
            store.migrate().await?;
            println!("Migrations applied");
            Ok(())
        }
    }
}

async fn open_store(config: &Config) -> Result<PgStore> {
    info!("📦 Connecting to database...");
    let pool = db::connect(&config.database).await?;
    info!("✅ Database connected");
    Ok(PgStore::new(pool))
}

async fn refresh(config: &Config, args: RefreshArgs) -> Result<()> {
    // Resolve the selection before touching the network or the database
    let selection = if let Some(key) = &args.source {
        let (section, source) = find_source(key)?;
        if !config.is_source_enabled(section.as_str(), source.as_str()) {
            bail!("Source '{}' is disabled in {}", source, section);
        }
        Selection::Source(section, source)
    } else if let Some(key) = &args.section {
        Selection::Sections(vec![key.parse()?])
    } else {
        Selection::Sections(SectionKey::ALL.to_vec())
    };

    let client = build_client(config.http.timeout())?;
    let store = open_store(config).await?;
    let pipeline = Pipeline::new(config, &client, &store);
    let processor = SectionProcessor::new(config, &store, &pipeline);

    match selection {
        Selection::Source(section, source) => {
            info!("=== {} / {} ===", section.name(), source);
            let rows = processor.refresh_source(section, source).await?;
            println!("{}: success ({} rows)", source, rows);
        }
        Selection::Sections(sections) => {
            for section in sections {
                info!("=== {} ===", section.name());
                let outcomes = processor.refresh_all(section).await;
                print_outcomes(section, &outcomes);
            }
        }
    }

    if args.export_after {
        run_export(config, &store, &ExportFilter::default()).await?;
    }

    Ok(())
}

enum Selection {
    Source(SectionKey, Source),
    Sections(Vec<SectionKey>),
}

fn print_outcomes(section: SectionKey, outcomes: &[SourceOutcome]) {
    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    println!(
        "\n{} ({}): {} succeeded, {} failed",
        section.name(),
        section,
        outcomes.len() - failed,
        failed
    );
    for outcome in outcomes {
        let mark = if outcome.error.is_some() { "✗" } else { "✓" };
        println!("  {} {}", mark, outcome);
    }
}

async fn run_export(config: &Config, store: &dyn Store, filter: &ExportFilter) -> Result<()> {
    let results = export::export_all(store, config, filter).await?;
    print_files(&results);
    Ok(())
}

fn print_files(results: &[FileResult]) {
    println!("\nExport results:");
    for result in results {
        println!("  {}", result);
    }
}

fn list(config: &Config) {
    for section in SectionKey::ALL {
        let state = if config.is_section_enabled(section.as_str()) {
            "ENABLED"
        } else {
            "disabled"
        };
        println!("\n{} ({}) [{}]", section.name(), section, state);

        for source in section.sources() {
            let source_config = config.source_config(section.as_str(), source.as_str());
            let state = if config.is_source_enabled(section.as_str(), source.as_str()) {
                "ENABLED"
            } else {
                "disabled"
            };
            let description = source_config
                .and_then(|s| s.description.as_deref())
                .unwrap_or("");

            println!("  - {} [{}] {}", source, state, description);

            let prefixes = filters::source_prefixes(source.as_str()).unwrap_or(&[]);
            if !prefixes.is_empty() {
                println!("      vectors: {}", prefixes.join(", "));
                let pages = filters::pages_for_prefixes(prefixes);
                if !pages.is_empty() {
                    println!("      pages:   {}", pages.join(", "));
                }
            }
        }
    }

    println!("\nExport pages: {}", filters::all_pages().join(", "));
}

async fn test_connection(config: &Config) -> Result<()> {
    let settings = &config.database;
    println!("Server:   {}:{}", settings.server, settings.port);
    println!("Database: {}", settings.database);
    println!("Driver:   {}", settings.driver);
    println!("Auth:     {}", settings.auth_mode());

    let store = open_store(config).await?;
    store.ping().await.context("SELECT 1 failed")?;
    println!("Connection OK");

    let enabled = store.count_enabled_sources().await?;
    println!("Enabled data sources: {}", enabled);
    Ok(())
}
