//! `mailbridge` - SMTP listener that turns submitted mail into JSON.
//!
//! Accepts messages over a minimal SMTP dialogue, decomposes each one into a
//! structured email and writes it as JSON to stdout or to a directory.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailbridge_smtp::{
    DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT, DEFAULT_PORT, DEFAULT_READ_CHUNK_SIZE, Server, ServerConfig,
};
use output::JsonSink;

const DEFAULT_FILTER: &str = "mailbridge=info,mailbridge_smtp=info,mailbridge_mime=info";

#[derive(Parser)]
#[command(name = "mailbridge", version, about)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "MAILBRIDGE_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "MAILBRIDGE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds to wait for client input before dropping the connection (0 disables)
    #[arg(
        long,
        env = "MAILBRIDGE_IDLE_TIMEOUT",
        value_name = "SECS",
        default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs()
    )]
    idle_timeout: u64,

    /// Bytes requested from the socket per read
    #[arg(
        long,
        env = "MAILBRIDGE_READ_CHUNK_SIZE",
        value_name = "BYTES",
        default_value_t = DEFAULT_READ_CHUNK_SIZE
    )]
    read_chunk_size: usize,

    /// Directory for one JSON file per email (default: JSON lines on stdout)
    #[arg(short, long, env = "MAILBRIDGE_OUTPUT", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let idle_timeout = (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout));
        ServerConfig::builder()
            .host(self.host.clone())
            .port(self.port)
            .idle_timeout(idle_timeout)
            .read_chunk_size(self.read_chunk_size)
            .build()
    }

    fn log_filter(&self) -> String {
        match self.verbose {
            0 => DEFAULT_FILTER.to_string(),
            1 => DEFAULT_FILTER.replace("=info", "=debug"),
            _ => DEFAULT_FILTER.replace("=info", "=trace"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting mailbridge");

    let config = cli.server_config();
    let server = Server::bind(config.clone())
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

    match cli.output {
        Some(dir) => {
            let sink = JsonSink::directory(&dir)
                .await
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
            info!(dir = %dir.display(), "Writing one JSON file per email");
            serve(server, sink).await
        }
        None => serve(server, JsonSink::stdout()).await,
    }
}

async fn serve(server: Server, sink: JsonSink) -> anyhow::Result<()> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Ctrl-C received");
    };

    server.run_until(Arc::new(sink), shutdown).await?;
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names,
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_env_variables() {
        let command = Cli::command();
        let env = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|name| name.to_string_lossy().into_owned())
        };

        assert_eq!(env("host").as_deref(), Some("MAILBRIDGE_HOST"));
        assert_eq!(env("port").as_deref(), Some("MAILBRIDGE_PORT"));
        assert_eq!(env("idle_timeout").as_deref(), Some("MAILBRIDGE_IDLE_TIMEOUT"));
        assert_eq!(
            env("read_chunk_size").as_deref(),
            Some("MAILBRIDGE_READ_CHUNK_SIZE")
        );
        assert_eq!(env("output").as_deref(), Some("MAILBRIDGE_OUTPUT"));
        assert_eq!(env("verbose"), None);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["mailbridge"]).unwrap();
        let config = cli.server_config();
        assert_eq!(config, ServerConfig::new());
        assert!(cli.output.is_none());
        assert_eq!(cli.log_filter(), DEFAULT_FILTER);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "mailbridge",
            "--host",
            "0.0.0.0",
            "-p",
            "2525",
            "--idle-timeout",
            "0",
            "-o",
            "/tmp/mail",
            "-vv",
        ])
        .unwrap();
        let config = cli.server_config();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 2525);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/mail")));
        assert_eq!(
            cli.log_filter(),
            "mailbridge=trace,mailbridge_smtp=trace,mailbridge_mime=trace"
        );
    }
}
