//! Poker clock server entrypoint wiring REST, WebSocket clocks and the durable store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poker_clock_back::{
    auth::JwtVerifier,
    config::AppConfig,
    dao::tournament_store::memory::MemoryTournamentStore,
    routes,
    services::tournament_service,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let verifier = Arc::new(JwtVerifier::new(config.jwt_secret()));
    let app_state = AppState::new(config, verifier);

    match env::var("MONGO_URI").ok().filter(|uri| !uri.is_empty()) {
        Some(uri) => start_mongo_store(app_state.clone(), uri),
        None => start_memory_store(app_state.clone()).await,
    }

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

/// Install the process-local store and load its tournaments.
async fn start_memory_store(state: SharedState) {
    info!("MONGO_URI not set; using the in-memory store");
    state
        .install_store(Arc::new(MemoryTournamentStore::new()))
        .await;
    if let Err(err) = tournament_service::restore_active(&state).await {
        error!(error = %err, "failed to load tournaments");
    }
}

/// Supervise the MongoDB connection in the background; the server starts degraded until it is up.
#[cfg(feature = "mongo-store")]
fn start_mongo_store(state: SharedState, uri: String) {
    use poker_clock_back::{
        dao::{
            storage::StorageError,
            tournament_store::{
                TournamentStore,
                mongodb::{MongoConfig, MongoTournamentStore},
            },
        },
        services::storage_supervisor,
    };

    let db_name = env::var("MONGO_DB").ok();
    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
            let store = MongoTournamentStore::connect(config).await?;
            Ok::<_, StorageError>(Arc::new(store) as Arc<dyn TournamentStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
fn start_mongo_store(state: SharedState, _uri: String) {
    warn!("MONGO_URI is set but the `mongo-store` feature is disabled; using the in-memory store");
    tokio::spawn(async move { start_memory_store(state).await });
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
