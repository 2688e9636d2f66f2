//! librechat-client-mcp: MCP server for the LibreChat client package
//!
//! Serves the `packages/client` sources of the LibreChat repository to AI
//! assistants over stdio, SSE or streamable HTTP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use librechat_client_mcp::config::{self, Config, Overrides};
use librechat_client_mcp::error::ServerError;
use librechat_client_mcp::github::{GitHubClient, RateLimitState};
use librechat_client_mcp::repo::Repository;
use librechat_client_mcp::transport::{TransportManager, TransportMode};

/// MCP server for the LibreChat client package.
///
/// Lets AI assistants browse hooks, components, providers and utilities of
/// LibreChat's `packages/client` without cloning the repository.
#[derive(Parser, Debug)]
#[command(name = "librechat-client-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// GitHub personal access token (raises the API rate limit)
    #[arg(short = 'g', long, env = "GITHUB_PERSONAL_ACCESS_TOKEN", hide_env_values = true)]
    github_api_key: Option<String>,

    /// Transport mode
    #[arg(short, long, value_enum, env = "MCP_TRANSPORT_MODE")]
    mode: Option<TransportMode>,

    /// HTTP port (falls back to $PORT, then $MCP_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTP bind address
    #[arg(long, env = "MCP_HOST")]
    host: Option<String>,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "MCP_CORS_ORIGINS", value_delimiter = ',')]
    cors: Option<Vec<String>>,

    /// Response cache lifetime in seconds
    #[arg(long, env = "MCP_CACHE_TTL_SECS")]
    cache_ttl: Option<u64>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Reads the port from `PORT` (set by most PaaS hosts), then `MCP_PORT`.
fn port_from_env() -> Result<Option<u16>, String> {
    for name in ["PORT", "MCP_PORT"] {
        if let Ok(value) = std::env::var(name) {
            return value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| format!("{name} must be a port number, got '{value}'"));
        }
    }
    Ok(None)
}

impl Args {
    fn overrides(&self) -> Result<Overrides, String> {
        let port = match self.port {
            Some(port) => Some(port),
            None => port_from_env()?,
        };
        Ok(Overrides {
            mode: self.mode,
            host: self.host.clone(),
            port,
            cors_origins: self.cors.as_ref().map(|origins| {
                origins
                    .iter()
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            }),
            github_token: self.github_api_key.clone(),
            cache_ttl_secs: self.cache_ttl,
        })
    }
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. stdout is reserved for the stdio
/// transport, so logs go to stderr.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the shared repository and runs the configured transports.
async fn serve(cfg: Config) -> Result<(), ServerError> {
    let rate_limit = Arc::new(RateLimitState::new());
    let client = GitHubClient::new(cfg.github_options(), Arc::clone(&rate_limit))
        .map_err(ServerError::Client)?;
    if !client.has_token() {
        warn!(
            "No GitHub token configured; unauthenticated requests are limited to 60 per hour. \
             Set GITHUB_PERSONAL_ACCESS_TOKEN or pass --github-api-key"
        );
    }

    let repository = Arc::new(Repository::new(
        Arc::new(client),
        cfg.package_layout(),
        cfg.cache_ttl(),
        cfg.cache.max_entries,
        cfg.retry_policy(),
        rate_limit,
    ));

    TransportManager::new(cfg.transport.mode, cfg.http_options(), repository)
        .run()
        .await?;
    Ok(())
}

/// Entry point for the librechat-client-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match args.overrides() {
        Ok(overrides) => cfg.apply(overrides),
        Err(message) => {
            eprintln!("Configuration error: {message}");
            return ExitCode::FAILURE;
        }
    }
    if let Err(e) = cfg.validate() {
        eprintln!("Configuration error: {e}");
        if let Some(default_path) = config::default_config_path() {
            eprintln!("\nConfig file location: {}", default_path.display());
        }
        return ExitCode::FAILURE;
    }

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %cfg.transport.mode,
        repository = %cfg.package_layout().repository.full_name(),
        package = %cfg.repository.package_path,
        "Starting librechat-client-mcp server"
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn flags_become_overrides() {
        let args = Args::parse_from([
            "librechat-client-mcp",
            "-m",
            "http",
            "-p",
            "8080",
            "--cors",
            "https://a.example, https://b.example",
            "-g",
            "ghp_token",
        ]);
        let overrides = args.overrides().unwrap();
        assert_eq!(overrides.mode, Some(TransportMode::Http));
        assert_eq!(overrides.port, Some(8080));
        assert_eq!(
            overrides.cors_origins,
            Some(vec!["https://a.example".to_string(), "https://b.example".to_string()])
        );
        assert_eq!(overrides.github_token.as_deref(), Some("ghp_token"));
    }

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(get_log_level(3, true, "info"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(2, false, "warn"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "nonsense"), Level::WARN);
    }
}
