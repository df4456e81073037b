mod api;
mod history_store;
mod middleware;

use std::{net::SocketAddr, sync::Arc};

use placefinder_places::{CoordinateGeocoder, SearchOrchestrator};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    history_store::open_history,
    middleware::RateLimitState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = placefinder_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting placefinder server");
    tracing::info!(
        "locations are resolved by the coordinate geocoder: send \"lat,lng\" \
         (e.g. \"30.2672,-97.7431\"); place names return location_not_found"
    );

    let history = open_history(&config).await?;
    let orchestrator = SearchOrchestrator::from_app_config(&config, Arc::new(CoordinateGeocoder))?
        .with_history(Arc::clone(&history));

    let app = build_app(
        AppState {
            orchestrator: Arc::new(orchestrator),
            history,
        },
        RateLimitState::from_app_config(&config),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
