// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chalkline API Server
//!
//! An LTI 1.3 Advantage tool: platforms register against it (dynamically
//! or by hand), launch into it, and get scores back through AGS.

use chalkline::{
    config::Config,
    db::RegistrationStore,
    services::{
        AccessTokenService, AgsClient, DynamicRegistrationService, LaunchCache, NonceStore,
        NrpsClient, PlatformKeyVerifier, ToolKeys,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Chalkline API");

    // Open the embedded registration store
    let store =
        RegistrationStore::open(&config.storage_path).expect("Failed to open registration store");

    // Tool signing key (generated on first start)
    let keys = ToolKeys::load_or_generate(&store).expect("Failed to load tool signing key");
    tracing::info!(kid = keys.kid(), "Tool signing key ready");

    // Platform id_token verification
    let platform_keys =
        PlatformKeyVerifier::new().expect("Failed to initialize platform key verifier");

    // Service access tokens for AGS/NRPS calls
    let tokens = AccessTokenService::new(keys.clone());

    // Dynamic registration handshake driver
    let registrations = DynamicRegistrationService::new(store.clone())
        .expect("Failed to initialize registration service");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        keys,
        platform_keys,
        launches: LaunchCache::default(),
        nonces: NonceStore::default(),
        tokens,
        ags: AgsClient::new(),
        nrps: NrpsClient::new(),
        registrations,
    });

    // Build router
    let app = chalkline::routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chalkline=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
