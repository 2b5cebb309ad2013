use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use ibm_findings::config::Config;
use ibm_findings::ibm::auth;
use ibm_findings::ibm::client::IbmClient;
use ibm_findings::ibm::findings::{list_providers, validate_page_size, ProvidersQuery};
use ibm_findings::ibm::http::format_ibm_error;
use ibm_findings::CompositeId;
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// List IBM Cloud Security and Compliance findings providers
#[derive(Parser, Debug)]
#[command(name = "ibm-findings", version, about, long_about = None)]
struct Args {
    /// IBM Cloud region of the findings endpoint
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every findings provider in one or more accounts
    Providers {
        /// Account to list (repeatable); defaults to the API key's account
        #[arg(short, long = "account-id")]
        account_ids: Vec<String>,

        /// Offset of the first provider to return
        #[arg(long)]
        skip: Option<u64>,

        /// Maximum number of providers to return (1-200)
        #[arg(long)]
        limit: Option<u64>,

        #[arg(short, long, value_enum, default_value = "json")]
        output: OutputFormat,
    },

    /// Encode or decode composite resource IDs
    Id {
        #[command(subcommand)]
        action: IdAction,
    },

    /// Show or change persisted defaults
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum IdAction {
    /// Join components into one ID
    Encode {
        #[arg(required = true)]
        parts: Vec<String>,
    },
    /// Split an ID into its components
    Decode {
        id: String,
        /// Expected number of components
        #[arg(long)]
        parts: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    SetAccount { account_id: String },
    SetRegion { region: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG, when set, refines the --log-level ceiling per target
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("ibm-findings started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("ibm-findings").join("ibm-findings.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ibm-findings").join("ibm-findings.log");
    }
    PathBuf::from("ibm-findings.log")
}

fn print_output<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

async fn run_providers(
    config: &Config,
    region: Option<String>,
    account_ids: Vec<String>,
    skip: Option<u64>,
    limit: Option<u64>,
    output: OutputFormat,
) -> Result<()> {
    let api_key = auth::api_key_from_env()
        .context("No API key configured. Set IC_API_KEY or IBMCLOUD_API_KEY")?;

    if let Some(page_size) = config.page_size {
        validate_page_size(page_size).context("Invalid page_size in config")?;
    }

    let region = region.unwrap_or_else(|| config.effective_region());
    tracing::info!("Using region: {}", region);

    let client = IbmClient::new(&api_key, config.endpoints(&region))?;
    let collector = config.collector();

    let accounts = if account_ids.is_empty() {
        vec![config.effective_account()]
    } else {
        account_ids.into_iter().map(Some).collect()
    };

    let queries: Vec<ProvidersQuery> = accounts
        .into_iter()
        .map(|account_id| ProvidersQuery {
            account_id,
            skip,
            limit,
        })
        .collect();

    // Accounts are listed concurrently; each listing pages sequentially
    let results = join_all(
        queries
            .iter()
            .map(|query| list_providers(&client, &collector, query)),
    )
    .await;

    let listings = results.into_iter().collect::<Result<Vec<_>>>()?;

    match listings.as_slice() {
        [single] => print_output(single, output),
        _ => print_output(&listings, output),
    }
}

fn run_id(action: IdAction) -> Result<()> {
    match action {
        IdAction::Encode { parts } => {
            let id = CompositeId::new(parts)?;
            println!("{}", id);
        }
        IdAction::Decode { id, parts } => {
            let decoded = match parts {
                Some(expected) => CompositeId::decode(&id, expected)?,
                None => id.parse::<CompositeId>()?,
            };
            for part in decoded.parts() {
                println!("{}", part);
            }
        }
    }
    Ok(())
}

fn run_config(mut config: Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print_output(&config, OutputFormat::Json),
        ConfigAction::SetAccount { account_id } => config.set_account(&account_id),
        ConfigAction::SetRegion { region } => config.set_region(&region),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();

    match args.command {
        Command::Providers {
            account_ids,
            skip,
            limit,
            output,
        } => run_providers(&config, args.region, account_ids, skip, limit, output).await,
        Command::Id { action } => run_id(action),
        Command::Config { action } => run_config(config, action),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: {err:#}");
            None
        }
    };

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_ibm_error(&err));
        drop(log_guard);
        std::process::exit(1);
    }
}
