//! tictactoe-back binary entrypoint wiring the session store, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tictactoe_back::{
    build_router,
    config::{AppConfig, StoreKind},
    dao::session_store::{MemorySessionStore, SessionStore},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = AppConfig::load();
    if let Some(port) = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config = config.with_port(port);
    }

    let store = connect_store(config.store()).await?;
    let port = config.port();
    let app = build_router(AppState::new(store, config));

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

/// Instantiate the configured storage backend.
async fn connect_store(kind: StoreKind) -> anyhow::Result<Arc<dyn SessionStore>> {
    match kind {
        StoreKind::Memory => {
            info!("using in-memory session store; sessions are lost on restart");
            Ok(Arc::new(MemorySessionStore::new()))
        }
        StoreKind::Couch => connect_couch().await,
        StoreKind::Mongo => connect_mongo().await,
    }
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> anyhow::Result<Arc<dyn SessionStore>> {
    use tictactoe_back::dao::session_store::couchdb::{CouchConfig, CouchSessionStore};

    let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
    let store = CouchSessionStore::connect(config)
        .await
        .context("connecting to CouchDB")?;
    info!("connected to CouchDB session store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "couch-store"))]
async fn connect_couch() -> anyhow::Result<Arc<dyn SessionStore>> {
    anyhow::bail!("CouchDB store requested but the `couch-store` feature is disabled")
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> anyhow::Result<Arc<dyn SessionStore>> {
    use tictactoe_back::dao::session_store::mongodb::{MongoConfig, MongoSessionStore};

    let config = MongoConfig::from_env()
        .await
        .context("reading MongoDB configuration")?;
    let store = MongoSessionStore::connect(config)
        .await
        .context("connecting to MongoDB")?;
    info!("connected to MongoDB session store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "mongo-store"))]
async fn connect_mongo() -> anyhow::Result<Arc<dyn SessionStore>> {
    anyhow::bail!("MongoDB store requested but the `mongo-store` feature is disabled")
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
                tracing::warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
