use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use headcount::{
    client,
    config::{Config, ConfigLoader},
    server::{self, ServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Keeps a simulated body pool in step with a broadcast count")]
struct Cli {
    /// Path to a YAML config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the count broadcast server
    Serve {
        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the headless client against a count server
    Client {
        /// Override the server URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("headcount=info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::new(".").load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Serve { host, port } => {
            server::run(ServerConfig {
                host: host.unwrap_or(config.listen.host),
                port: port.unwrap_or(config.listen.port),
            })
            .await
        }
        Command::Client { url } => {
            if let Some(url) = url {
                config.server_url = url;
            }
            client::run(config).await
        }
    }
}
