use clap::Parser;
use std::path::PathBuf;
use tinyserve::{Router, Server};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const ADDRESS: &str = "localhost:4221";

/// Minimal HTTP/1.1 server with echo, user-agent and file routes
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory served and written by `/files/<name>`
    #[arg(long, default_value = ".")]
    directory: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "tinyserve=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let listener = TcpListener::bind(ADDRESS).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        directory = %args.directory.display(),
        "tinyserve starting"
    );

    Server::builder()
        .listener(listener)
        .handler(Router::new(args.directory))
        .build()
        .launch()
        .await;

    Ok(())
}
