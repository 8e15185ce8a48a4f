use quill_common::util::PositiveDuration;
use quill_db::{
    client::DbClient,
    memory::MemoryStore,
    store::{DbError, Store},
};
use serde::Deserialize;
use server::{
    ServerState, SessionTtl,
    cache::{DEFAULT_PAGE_CACHE_CAPACITY, PageCache},
    media::MediaStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
    #[error("SESSION_TTL_HOURS must be at most {MAX_SESSION_TTL_HOURS}, got {0}")]
    SessionTtlOutOfRange(i64),
}

const MAX_SESSION_TTL_HOURS: i64 = 24 * 366 * 100;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    #[serde(default = "default_media_root")]
    media_root: PathBuf,
    #[serde(default = "default_index_cache_seconds")]
    index_cache_seconds: u64,
    #[serde(default = "default_session_ttl_hours")]
    session_ttl_hours: i64,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_index_cache_seconds() -> u64 {
    20
}

fn default_session_ttl_hours() -> i64 {
    24 * 14
}

fn session_ttl(hours: i64) -> Result<SessionTtl, InitError> {
    if hours > MAX_SESSION_TTL_HOURS {
        return Err(InitError::SessionTtlOutOfRange(hours));
    }

    let ttl = hours
        .checked_mul(60 * 60)
        .map(time::Duration::seconds)
        .ok_or(InitError::SessionTtlOutOfRange(hours))?;

    Ok(SessionTtl(PositiveDuration::new(ttl)))
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quill_api=debug,quill_common=debug,quill_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping all data in memory");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let client = DbClient::connect(database_url, env.database_max_connections).await?;
    client.migrate().await?;
    info!("Connected to database");

    Ok(Arc::new(client))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let store = connect_store(&env).await?;
    let session_ttl = session_ttl(env.session_ttl_hours)?;
    let state = ServerState {
        store,
        page_cache: Arc::new(PageCache::new(
            Duration::from_secs(env.index_cache_seconds),
            DEFAULT_PAGE_CACHE_CAPACITY,
        )),
        media: Arc::new(MediaStore::new(env.media_root.clone())),
        session_ttl,
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::app(state).layer(tracing_layer);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(address = %server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{InitError, MAX_SESSION_TTL_HOURS, session_ttl};

    #[test]
    fn session_ttl_bounds() {
        let two_weeks = session_ttl(24 * 14).unwrap().0.unwrap();
        assert_eq!(two_weeks.get(), time::Duration::days(14));

        assert_eq!(session_ttl(0).unwrap().0, None);
        assert_eq!(session_ttl(-5).unwrap().0, None);
        assert!(session_ttl(MAX_SESSION_TTL_HOURS).is_ok());

        assert!(matches!(
            session_ttl(MAX_SESSION_TTL_HOURS + 1),
            Err(InitError::SessionTtlOutOfRange(_))
        ));
        assert!(matches!(
            session_ttl(i64::MAX),
            Err(InitError::SessionTtlOutOfRange(_))
        ));
    }
}
