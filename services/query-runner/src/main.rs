//! Weather catalog query runner.
//!
//! Drives the catalog pipeline from the command line: builds a query from
//! flat parameters, selects a catalog, and resolves the data into a table.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog::RegistryConfig;
use commands::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "query-runner")]
#[command(about = "Select weather catalogs and extract point time series")]
struct Args {
    /// Catalog registry configuration file (defaults to a local catalog)
    #[arg(short, long, env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the flattened query parameter schema
    Schema,

    /// List configured catalogs in selection order
    Catalogs,

    /// Resolve a query given as a JSON file of flat parameters
    Run {
        /// Flat parameters file
        #[arg(short, long)]
        params: PathBuf,

        /// Use this catalog instead of selecting one
        #[arg(long)]
        catalog: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Copy the dataset a query addresses between two catalogs
    Copy {
        /// Flat parameters file
        #[arg(short, long)]
        params: PathBuf,

        /// Source catalog id
        #[arg(long)]
        from: String,

        /// Target catalog id
        #[arg(long)]
        to: String,
    },
}

fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so command output stays clean on stdout.
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<RegistryConfig> {
    let config = match path {
        Some(path) => RegistryConfig::from_file(path)?.apply_env()?,
        None => RegistryConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    if let Command::Schema = args.command {
        println!("{}", commands::schema_json()?);
        return Ok(());
    }

    let config = load_config(args.config.as_ref())?;
    let registry = config.build_registry()?;
    info!(catalogs = ?registry.catalog_ids(), "Loaded catalog registry");

    match args.command {
        Command::Schema => {}
        Command::Catalogs => {
            for id in registry.catalog_ids() {
                println!("{}", id);
            }
        }
        Command::Run {
            params,
            catalog,
            format,
        } => {
            let params = commands::load_params(&params)?;
            let table = commands::run_query(&registry, &params, catalog.as_deref()).await?;
            print!("{}", commands::render(&table, format)?);
        }
        Command::Copy { params, from, to } => {
            let params = commands::load_params(&params)?;
            let uploaded = commands::copy_dataset(&registry, &params, &from, &to).await?;
            println!("{}", uploaded);
        }
    }

    Ok(())
}
