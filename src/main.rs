use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use charmpay::config::Config;
use charmpay::store::{FileOrderStore, MemoryOrderStore, OrderStore};
use charmpay::stripe::StripeClient;
use charmpay::{AppState, create_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn OrderStore> = match &config.orders_file {
        Some(path) => {
            tracing::info!("using file-backed order store at {}", path);
            Arc::new(FileOrderStore::open(path).await.map_err(|e| {
                anyhow::anyhow!("failed to open order store: {}", e)
            })?)
        }
        None => {
            tracing::info!("using in-memory order store");
            Arc::new(MemoryOrderStore::new())
        }
    };

    let timeout = Duration::from_secs(config.gateway_timeout_secs);
    let stripe = match &config.stripe_api_url {
        Some(url) => StripeClient::with_base_url(
            config.stripe_secret_key.clone(),
            url.clone(),
            timeout,
        ),
        None => StripeClient::new(config.stripe_secret_key.clone(), timeout),
    };

    let state = AppState::new(store, stripe, config.webhook_secret.clone());
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
