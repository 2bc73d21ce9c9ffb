use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use meu_cinema::auth::{AuthManager, SessionStore};
use meu_cinema::config::Config;
use meu_cinema::embed::EmbedClient;
use meu_cinema::live::LiveClient;
use meu_cinema::tmdb::TmdbClient;
use meu_cinema::{api, db, onboarding, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Starting Meu Cinema...");

    onboarding::maybe_run_onboarding()?;

    let config = Config::new()?;
    info!("Configuration loaded");

    let db_pool = db::init_db(&config.database_url).await?;
    info!("Database initialized");

    let auth_manager = AuthManager::new(db_pool.clone());
    let session_store = SessionStore::new(db_pool.clone(), config.session_secret.clone());

    let embed_client = EmbedClient::new(&config.embed_base_url);
    let tmdb_client = TmdbClient::new(&config.tmdb_api_key, embed_client)?;
    info!("TMDB client initialized");

    let live_client = LiveClient::new(&config.live_api_url)?;
    info!("Live-source client initialized");

    let state = AppState {
        db: db_pool,
        tmdb: tmdb_client,
        live: Arc::new(live_client),
        auth: Arc::new(auth_manager),
        sessions: Arc::new(session_store),
    };

    let app = Router::new()
        .nest("/api", api::routes(state))
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
