//! jobtrack - client-side sync layer for a job application tracker
//!
//! Smoke binary: binds to the configured backend, refreshes the session,
//! and fetches the application collection once.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobtrack::{ApplicationsCache, Backend, Config, IdentityCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobtrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobtrack sync client");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: backend_url={}, request_timeout={}s",
        config.backend_url, config.request_timeout
    );

    // Bind to the hosted backend once; the caches share this handle
    let backend = Backend::rest(&config)?;
    let identity = IdentityCache::new(&backend);

    identity.initialize().await;
    if identity.is_authenticated().await {
        let applications = ApplicationsCache::new(&backend);
        let all = applications.fetch_all().await;
        info!(
            "Fetched {} applications for {}",
            all.len(),
            identity.display_name().await
        );
    } else {
        info!("No active session; sign in before fetching applications");
    }

    Ok(())
}
