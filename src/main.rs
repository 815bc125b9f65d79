//! Quizlink Back binary entrypoint wiring REST, SSE, and the hosted session
//! store supervisor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use auth::{Authenticator, rest::RestAuthenticator};
use config::AppConfig;
use dao::{
    session_store::{
        SessionStore,
        rest::{RestConfig, RestSessionStore},
    },
    storage::StorageError,
};
use services::{sse_service, storage_supervisor};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_config = AppConfig::load();

    let authenticator: Option<Arc<dyn Authenticator>> = match &app_config.store {
        Some(settings) => match RestAuthenticator::new(settings) {
            Ok(auth) => Some(Arc::new(auth)),
            Err(err) => {
                warn!(error = %err, "failed to build authenticator; requests will be rejected");
                None
            }
        },
        None => None,
    };

    let app_state = AppState::new(app_config, authenticator);

    if let Some(settings) = app_state.config().store.clone() {
        let connect = move || {
            let settings = settings.clone();
            async move {
                RestSessionStore::connect(RestConfig::from(&settings))
                    .await
                    .map(|store| Arc::new(store) as Arc<dyn SessionStore>)
                    .map_err(StorageError::from)
            }
        };
        tokio::spawn(storage_supervisor::run(app_state.clone(), connect));
    } else {
        warn!("store not configured; only the health endpoint will be useful");
    }

    tokio::spawn(sse_service::forward_system_status(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
///
/// The CORS layer answers preflight requests before any handler runs, so
/// even the retired endpoints stay reachable from browsers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
