// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use ledger_tx_service::{
    api::router,
    blockchain::{LocalKeyDevice, RestNetworkAdapter},
    config::Settings,
    logging,
    state::AppState,
    workflow::{InMemoryHistory, Location, TransactionState, TransactionWorkflow},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    logging::init(settings.log_format);

    tracing::info!(
        network = settings.network.name,
        backend_url = %settings.backend_url,
        address = ?settings.address,
        "Configuration loaded"
    );

    let network = Arc::new(RestNetworkAdapter::new(
        &settings.backend_url,
        settings.backend_timeout,
    )?);
    let history = Arc::new(InMemoryHistory::new(Location::new(format!(
        "/{}/transactions",
        settings.network.name.to_ascii_lowercase()
    ))));
    let state = TransactionState::new(settings.network, settings.address.clone());

    let mut workflow = TransactionWorkflow::new(network, history, state)
        .with_timing(settings.poll_timing)
        .with_device_timeout(settings.device_timeout);

    match &settings.ledger_key_pem {
        Some(path) => {
            let device = LocalKeyDevice::from_pem_file(path)?;
            workflow = workflow.with_device(Arc::new(device));
            tracing::info!(path = %path.display(), "Signing device loaded");
        }
        None => tracing::warn!("No signing device configured; sign requests will fail"),
    }

    let app = router(AppState::new(workflow));

    let addr = settings.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            shutdown.cancel();
        }
    });

    tracing::info!(address = %addr, "Ledger transaction service listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
