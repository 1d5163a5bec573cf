use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evidence_ledger::api::{self, AppState};
use evidence_ledger::config::AppConfig;
use evidence_ledger::crypto::Secp256k1Signer;
use evidence_ledger::database::Database;
use evidence_ledger::ledger::Ledger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evidence_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting evidence ledger");

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    let database = Database::new(&config.database_url).await?;
    database.run_migrations().await?;
    info!("Database ready");

    let mut ledger = Ledger::new(database);
    if let Some(path) = &config.signing_key_path {
        let signer = Secp256k1Signer::load(path)?;
        info!("Signing blocks with issuer key {}", signer.public_key_hex());
        ledger = ledger.with_signer(Arc::new(signer));
    }

    let bind_address = config.bind_address();
    let app = api::router(AppState::new(ledger, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
