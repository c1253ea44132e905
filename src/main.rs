//! modelgate - Main entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use modelgate::{
    config::Config,
    hooks::Plugin,
    passthrough::PassthroughPlugin,
    server::{ServerContext, router},
};

/// Pluggable HTTP inference server.
#[derive(Parser, Debug)]
#[command(name = "modelgate", version, about)]
struct Cli {
    /// Override the listener port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the model artifact directory.
    #[arg(long)]
    model_dir: Option<std::path::PathBuf>,

    /// Skip the startup model load (first invocation pays it instead).
    #[arg(long)]
    no_warmup: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(model_dir) = cli.model_dir {
        config.model.model_dir = model_dir;
    }
    if cli.no_warmup {
        config.model.warmup = false;
    }

    // The binary serves the stock pass-through behavior; embedders build
    // their own plugin table and call ServerContext::new directly.
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(PassthroughPlugin)];

    // Discovery, validation, and conflict detection happen here; a broken
    // plugin set aborts before the listener binds.
    let ctx = ServerContext::new(config, &plugins)?;

    if ctx.config.model.warmup {
        // Non-fatal: a cold external dependency surfaces per request and
        // the load is retried until it succeeds.
        if let Err(e) = ctx.warmup().await {
            tracing::warn!("Startup warmup failed, will retry on demand: {}", e);
        }
    }

    let addr = ctx.config.server.addr();
    let app = router(Arc::clone(&ctx));

    tracing::info!(addr = %addr, "modelgate listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
