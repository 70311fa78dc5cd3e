use std::path::PathBuf;

use clap::{Parser, Subcommand};
use taxidash_common::config::{DashConfig, DEFAULT_CONFIG_FILE_NAME};
use taxidash_load::errors::LoadError;
use taxidash_load::pipeline;


#[derive(Parser)]
#[command(name = "taxidash-load")]
#[command(about = "Loads NYC taxi trip records into PostgreSQL and builds the analytics aggregates", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database, schema and lookup tables
    Setup,

    /// Load zones and trip files into the trips table
    Load,

    /// Drop and recreate all aggregates
    Aggregates,

    /// Create all missing indexes
    Indexes,

    /// Refresh the contents of all aggregates
    Refresh,

    /// Run setup, load, aggregates and indexes in order
    All,
}


async fn run() -> Result<(), LoadError> {
    // set up tracing
    let (stderr_non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(stderr_non_blocking)
        .init();

    let cli = Cli::parse();
    let config = DashConfig::load(&cli.config)?;

    match cli.command {
        Command::Setup => pipeline::setup(&config).await?,
        Command::Load => {
            pipeline::load(&config).await?;
        },
        Command::Aggregates => pipeline::build_aggregates(&config).await?,
        Command::Indexes => pipeline::build_indexes(&config).await?,
        Command::Refresh => pipeline::refresh(&config).await?,
        Command::All => pipeline::run_all(&config).await?,
    }
    Ok(())
}

fn main() {
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async {
            run().await
        });

    std::process::exit(
        match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{}", e);
                1
            },
        }
    )
}
