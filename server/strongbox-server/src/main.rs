use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strongbox_server::config::Config;
use strongbox_server::server;

/// Strongbox gRPC server
#[derive(Parser, Debug)]
#[command(name = "strongbox-server")]
#[command(about = "Authenticated vault for files and credentials")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "./config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    init_tracing(&config.logger.level);

    info!("starting strongbox server");
    info!("version: {}", env!("CARGO_PKG_VERSION"));

    server::run(config).await?;
    Ok(())
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("strongbox_server={level},tower=warn").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
