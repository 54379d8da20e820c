#![warn(unused_extern_crates)]
use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tabula::{
    api::{AppState, router},
    assistant::DaoAssistant,
    config::AppConfig,
    involvement::WalletManager,
    llm::OpenAiChat,
    updates::UpdatesAgent,
};
use tally::TallyApi;
use tracing::{error, info};
use utils::tracing::{install_panic_hook, setup_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    setup_tracing();
    install_panic_hook();

    info!("Tabula service starting up");
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let tally =
        Arc::new(TallyApi::new(config.tally.clone()).context("Failed to build Tally client")?);
    let llm =
        Arc::new(OpenAiChat::new(config.llm.clone()).context("Failed to build model client")?);

    let state = AppState {
        wallet: Arc::new(WalletManager::new(tally.clone(), config.involvement.clone())),
        updates: Arc::new(UpdatesAgent::new(tally.clone(), llm.clone())),
        assistant: Arc::new(DaoAssistant::new(
            tally,
            llm,
            config.involvement.curated_daos.clone(),
        )),
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;

    let server_handle = tokio::spawn(async move {
        info!(address = %addr, "Starting API server");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    });

    tokio::select! {
        _ = server_handle => {
            error!("API server stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping Tabula");
        }
    }

    Ok(())
}
