pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod live;
pub mod models;
pub mod onboarding;
pub mod tmdb;

use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::auth::{AuthManager, SessionStore};
use crate::live::LiveClient;
use crate::tmdb::TmdbClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub tmdb: TmdbClient,
    pub live: Arc<LiveClient>,
    pub auth: Arc<AuthManager>,
    pub sessions: Arc<SessionStore>,
}
