use anyhow::Context;
use clap::{Parser, Subcommand};
use delivery_etl::config::EtlConfig;
use delivery_etl::logging;
use delivery_etl::pipeline::{Pipeline, PipelineResult};
use delivery_etl::report::{group_thousands, DatasetReport};
use delivery_etl::sink::SinkOutcome;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "delivery_etl")]
#[command(about = "Batch ETL for last-mile delivery order data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: extract, transform, validate, load (default)
    Run {
        /// Skip the database stage even if enabled in configuration
        #[arg(long)]
        no_db: bool,
    },
    /// Print a diagnostic report of the processed dataset
    Report,
}

fn print_summary(result: &PipelineResult) {
    println!("\n📊 Pipeline Results:");
    println!("   Rows in: {}", group_thousands(result.rows_in));
    println!("   Rows out: {}", group_thousands(result.rows_out));
    println!("   Dropped (missing identifier): {}", result.transform.dropped_missing_id);
    println!("   Duplicates removed: {}", result.transform.duplicates_removed);
    println!("   Missing values: {:.2}%", result.validation.missing_percent);
    println!("   Output file: {}", result.file.path.display());
    match &result.database {
        Some(outcome @ SinkOutcome::Failed { .. }) => println!("   Database: ⚠️  {outcome}"),
        Some(outcome) => println!("   Database: {outcome}"),
        None => println!("   Database: disabled"),
    }
    println!("   Duration: {:.2}s", result.duration.as_secs_f64());
}

async fn run(config: EtlConfig) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config);
    match pipeline.run().await {
        Ok(result) => {
            print_summary(&result);
            println!("\n✅ Pipeline completed successfully!");
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            println!("❌ Pipeline failed: {e}");
            Err(e.into())
        }
    }
}

fn report(config: &EtlConfig) -> anyhow::Result<()> {
    let path = &config.processed_dataset;
    let report = DatasetReport::from_path(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    match report {
        Some(report) => println!("{report}"),
        None => {
            println!("❌ Processed dataset not found: {}", path.display());
            println!("   Create it first with: delivery_etl run");
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let mut config = EtlConfig::load().context("failed to load configuration")?;
    info!(?config, "Configuration loaded");

    match cli.command.unwrap_or(Commands::Run { no_db: false }) {
        Commands::Run { no_db } => {
            if no_db {
                config.load_database = false;
            }
            run(config).await
        }
        Commands::Report => report(&config),
    }
}
