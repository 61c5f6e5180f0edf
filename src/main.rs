use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info};

use mcp_geocoder::client::{AnthropicClient, LanguageModel, McpClientSession, Orchestrator, ServerProcess};
use mcp_geocoder::config::Config;
use mcp_geocoder::error::McpResult;
use mcp_geocoder::geocoding::GeocodingClient;
use mcp_geocoder::mcp::McpServer;

/// Exit code for a missing or invalid configuration
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "mcp-geocoder", version, about = "MCP geocoding server and tool-calling client")]
struct Cli {
    /// Optional configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "MCP_GEOCODER_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the geocoding tool server on stdin/stdout
    Serve,

    /// Connect to a server command and answer queries with it
    Client {
        /// Answer a single query instead of starting the interactive loop
        #[arg(long, short)]
        query: Option<String>,

        /// Server command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        server: Vec<String>,
    },

    /// Start this binary's own server and a client attached to it
    Run {
        /// Answer a single query instead of starting the interactive loop
        #[arg(long, short)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Client { query, server } => {
            // clap guarantees at least one element
            let Some((command, args)) = server.split_first() else {
                return ExitCode::FAILURE;
            };
            run_client(&config, command, args, query).await
        }
        Commands::Run { query } => {
            let exe = match std::env::current_exe() {
                Ok(path) => path.display().to_string(),
                Err(e) => {
                    error!("Cannot locate own executable: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let mut args = Vec::new();
            if let Some(path) = &cli.config {
                args.push("--config".to_string());
                args.push(path.clone());
            }
            args.push("serve".to_string());
            run_client(&config, &exe, &args, query).await
        }
    }
}

async fn serve(config: Config) -> ExitCode {
    let geocoder = match GeocodingClient::new(&config.geocoding) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    info!(
        "Serving geocode via {} (key {})",
        geocoder.endpoint(),
        geocoder.api_key_hint()
    );

    let mcp_server = McpServer::new(geocoder);

    // Set up graceful shutdown
    let shutdown_signal = tokio::signal::ctrl_c();

    tokio::select! {
        result = mcp_server.run() => {
            if let Err(e) = result {
                error!("MCP server error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        _ = shutdown_signal => {
            info!("Interrupted, shutting down");
        }
    }

    ExitCode::SUCCESS
}

async fn run_client(
    config: &Config,
    command: &str,
    args: &[String],
    query: Option<String>,
) -> ExitCode {
    let model = match AnthropicClient::new(&config.anthropic) {
        Ok(model) => model,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let (process, session) = match ServerProcess::spawn(
        command,
        args,
        Duration::from_secs(config.client.request_timeout_seconds),
        Duration::from_secs(config.client.shutdown_timeout_seconds),
    ) {
        Ok(spawned) => spawned,
        Err(e) => {
            // Client session failures are user-facing text, not log records
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // The session is dropped before shutdown so the server sees EOF
    let outcome = tokio::select! {
        outcome = converse(session, Box::new(model), config, query) => outcome,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    process.shutdown().await;

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn converse(
    session: McpClientSession,
    model: Box<dyn LanguageModel + Send + Sync>,
    config: &Config,
    query: Option<String>,
) -> McpResult<()> {
    let handshake_timeout = Duration::from_secs(config.client.handshake_timeout_seconds);
    let mut orchestrator = Orchestrator::connect(session, model, handshake_timeout).await?;

    match query {
        Some(query) => {
            let answer = orchestrator.process_query(&query).await?;
            println!("{}", answer);
        }
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            orchestrator.chat_loop(stdin, tokio::io::stdout()).await?;
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    // Support both LOG_LEVEL and RUST_LOG environment variables
    let filter = if let Ok(rust_log) = std::env::var("RUST_LOG") {
        tracing_subscriber::EnvFilter::try_new(rust_log)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    } else if let Ok(log_level) = std::env::var("LOG_LEVEL") {
        let level_str = match log_level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" | "warning" => "warn",
            "error" => "error",
            _ => "warn", // Default to WARN for invalid values
        };
        tracing_subscriber::EnvFilter::new(level_str)
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // stdout carries the protocol
        .compact()
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
