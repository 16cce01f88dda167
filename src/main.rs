use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use kisan_sathi::app::{self, AppState};
use kisan_sathi::config::Config;
use kisan_sathi::llm::{ChatBackend, GeminiClient};
use kisan_sathi::{Request, Server};

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("{e}");
    }

    if let Err(e) = run().await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kisan_sathi=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    Ok(())
}

async fn run() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "ignoring unreadable .env file");
        }
    }

    let config = Config::from_env()?;
    let client = GeminiClient::new(config.gemini())?;
    info!(model = client.model(), "using Gemini backend");

    let handler = app::handler(Arc::new(AppState::new(Arc::new(client))));

    let server = Server::bind(&config.addr).await?;
    server
        .run_until(
            move |req: Request| {
                let handler = handler.clone();
                async move { handler.handle(req).await }
            },
            shutdown_signal(),
        )
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
