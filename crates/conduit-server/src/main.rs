//! Conduit - entry point
//!
//! Loads configuration, initializes telemetry, wires the configured backends
//! into the gateway and serves HTTP until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use conduit_config::{ConfigLoader, ENV_PREFIX};
use conduit_server::{bootstrap, Server, ServerError};

/// Command-line arguments.
struct Args {
    /// Configuration file.
    config: Option<PathBuf>,
    /// Validate configuration and exit.
    check: bool,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            config: None,
            check: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().ok_or("--config requires a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--check" => parsed.check = true,
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-V" => {
                    println!("conduit {}", conduit_server::VERSION);
                    std::process::exit(0);
                }
                other => return Err(format!("unknown argument: {other}")),
            }
        }

        Ok(parsed)
    }
}

fn print_help() {
    println!(
        r"Conduit - multi-tenant message ingestion gateway

USAGE:
    conduit [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file (TOML or JSON, by extension)
        --check            Validate configuration and exit
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    CONDUIT__SERVER__HTTP_ADDR               Listen address (default: 0.0.0.0:8080)
    CONDUIT__ADMISSION__MAX_MESSAGE_BYTES    Message size ceiling (default: 262144)
    CONDUIT__QUEUE__BACKEND                  memory | spool
    CONDUIT__QUEUE__SPOOL_DIR                Spool directory
    CONDUIT__QUEUE__MEMORY_CAPACITY          Messages kept per in-memory queue (default: 10000)
    CONDUIT__ARCHIVE__BACKEND                disabled | memory | fs
    CONDUIT__ARCHIVE__ROOT_DIR               Archive directory
    CONDUIT__ARCHIVE__MEMORY_CAPACITY        Records kept by the in-memory archive (default: 10000)
    CONDUIT__AUTHZ__BACKEND                  static | remote
    CONDUIT__AUTHZ__REMOTE_URL               Remote authorization endpoint
    CONDUIT__TELEMETRY__METRICS__ADDR        Prometheus listener (default: 0.0.0.0:9090)
    RUST_LOG                                 Overrides the configured log filter

A .env file in the working directory is loaded before the environment is read.
"
    );
}

fn load_config(args: &Args) -> Result<conduit_config::ConduitConfig, ServerError> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path)?;
    } else {
        loader = loader.with_optional_file("conduit.toml")?;
    }
    Ok(loader.with_dotenv().with_env_prefix(ENV_PREFIX).load()?)
}

async fn run(args: Args) -> Result<(), ServerError> {
    let config = load_config(&args)?;
    if args.check {
        println!("configuration is valid");
        return Ok(());
    }

    let _telemetry = conduit_telemetry::init_telemetry(&config.telemetry)?;
    tracing::info!(version = conduit_server::VERSION, "Starting Conduit");

    let addr = config.http_addr()?;
    let gateway = bootstrap::build_gateway(&config).await?;
    Server::from_config(Arc::new(gateway), &config).run(addr).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Use --help for usage information");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized when configuration fails.
            if e.is_startup_config() {
                eprintln!("conduit: {e}");
            } else {
                tracing::error!(error = %e, "Conduit failed");
            }
            ExitCode::FAILURE
        }
    }
}
