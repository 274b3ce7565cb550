use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zonesync::catalog::catalog_hash;
use zonesync::command::ShellCommandRunner;
use zonesync::dnssec::BindDnssecTools;
use zonesync::domain::DirectoryDomainStore;
use zonesync::jobs::{Job, JobEnvelope, JobQueue, LocalJobQueue};
use zonesync::resolve::SystemResolver;
use zonesync::zone::{ZoneParser, next_serial, render};
use zonesync::{SyncConfig, SyncContext};

#[derive(Parser)]
#[command(name = "zonesync", version, about = "Keep BIND zone files and the catalog zone in sync")]
struct Cli {
    /// TOML configuration file; defaults plus ZONESYNC_* variables when absent
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workers on job envelopes read line by line from stdin
    Run {
        /// Exit once stdin is closed and every job has finished
        #[arg(long)]
        drain: bool,
    },
    /// Parse a zone file and print it re-rendered
    CheckZone {
        file: PathBuf,
        /// Origin for files without $ORIGIN
        #[arg(long)]
        origin: Option<String>,
    },
    /// Print the serial following PREVIOUS
    NextSerial { previous: u32 },
    /// Print the catalog member hash of a domain
    CatalogHash { domain: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::from_env()?,
    })
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { drain } => {
            let config = load_config(cli.config.as_ref())?;
            init_tracing(&config.log_filter);
            run(config, drain).await?;
        }
        Commands::CheckZone { file, origin } => {
            let mut parser = match origin {
                Some(origin) => ZoneParser::with_origin(&origin),
                None => ZoneParser::new(),
            };
            let document = parser.parse_file(&file)?;
            print!("{}", render(&document));
        }
        Commands::NextSerial { previous } => {
            println!("{}", next_serial(previous));
        }
        Commands::CatalogHash { domain } => {
            println!("{}", catalog_hash(&domain)?);
        }
    }

    Ok(())
}

async fn run(config: SyncConfig, drain: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(DirectoryDomainStore::new(config.domain_dir.clone()));
    let tools = Arc::new(BindDnssecTools::new(
        config.keygen_command.clone(),
        config.dsfromkey_command.clone(),
    ));
    let context = SyncContext::build(
        config,
        store,
        Arc::new(ShellCommandRunner),
        Arc::new(SystemResolver),
        tools,
        LocalJobQueue::new(),
    );
    let pool = context.spawn_workers();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping workers");
                break;
            }
            _ = context.queue.wait_idle(), if drain && !stdin_open => {
                info!("All jobs finished");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => submit(&context.queue, &line).await,
                Ok(None) => {
                    info!("Job input closed");
                    stdin_open = false;
                }
                Err(e) => {
                    error!("Reading job input failed: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    pool.shutdown().await;
    Ok(())
}

async fn submit(queue: &LocalJobQueue, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let job = JobEnvelope::from_json(line).and_then(|envelope| Job::from_envelope(&envelope));
    match job {
        Ok(job) => {
            if let Err(e) = queue.enqueue(job).await {
                error!("Cannot enqueue job: {}", e);
            }
        }
        Err(e) => warn!("Ignoring job '{}': {}", line, e),
    }
}
