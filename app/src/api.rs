use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{AdminUser, CurrentUser, ProfileUpdate, Viewer};
use crate::error::AppError;
use crate::models::{CastMember, ContentItem, ContentKind, Episode, Genre, Review, User};
use crate::tmdb;
use crate::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me).put(update_me))
        .route("/home", get(home))
        .route("/catalog/genres", get(genres))
        .route("/catalog/:kind/trending", get(trending))
        .route("/catalog/:kind/popular", get(popular))
        .route("/catalog/:kind/genre/:genre_id", get(by_genre))
        .route("/catalog/:kind/:id", get(details))
        .route("/catalog/:kind/:id/credits", get(credits))
        .route("/catalog/:kind/:id/reviews", get(reviews))
        .route("/search", get(search))
        .route("/series/:id/season/:season/episodes", get(episodes))
        .route("/live/channels", get(channels))
        .route("/live/channels/categories", get(channel_categories))
        .route("/live/sports", get(sports))
        .route("/live/sports/categories", get(sport_categories))
        .route("/admin/users", get(admin_list_users))
        .route(
            "/admin/users/:id",
            put(admin_update_user).delete(admin_delete_user),
        )
        .with_state(state)
}

/// Provider failures degrade to an empty listing here, on purpose: the UI
/// renders an empty shelf, never an error screen (auth is the exception).
fn empty_on_error<T>(result: anyhow::Result<Vec<T>>, what: &str) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!("{} indisponível: {}", what, e);
            Vec::new()
        }
    }
}

fn vod_kind(kind: &str) -> Result<ContentKind, AppError> {
    ContentKind::parse(kind)
        .filter(|parsed| !parsed.is_live())
        .ok_or_else(|| AppError::BadRequest(format!("Catálogo desconhecido: {}", kind)))
}

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: User,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .auth
        .register(&body.email, &body.password)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(user))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .auth
        .verify_credentials(&body.email, &body.password)
        .await?
        .ok_or_else(|| AppError::BadRequest("E-mail ou senha inválidos".to_string()))?;

    let token = state.sessions.create_session(&user.id).await?;

    Ok(Json(LoginResponse { token, user }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<()>, AppError> {
    if let Some(token) = crate::auth::session_token(&headers) {
        state.sessions.delete_by_token(&token).await?;
    }
    Ok(Json(()))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    // role and status are admin-only fields
    let updates = ProfileUpdate {
        role: None,
        status: None,
        ..body
    };

    state.auth.update_profile(&user.id, &updates).await?;

    let updated = state
        .auth
        .get_profile(&user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(updated))
}

#[derive(Serialize)]
struct HomeResponse {
    movies: Vec<ContentItem>,
    series: Vec<ContentItem>,
    channels: Vec<ContentItem>,
}

/// Home shelves are fetched together and joined; no completion order is
/// promised between them.
async fn home(State(state): State<AppState>, _viewer: Viewer) -> Json<HomeResponse> {
    let (movies, series, channels) = tokio::join!(
        state.tmdb.trending(ContentKind::Movie, "week"),
        state.tmdb.trending(ContentKind::Series, "week"),
        state.live.channels(),
    );

    Json(HomeResponse {
        movies: empty_on_error(movies, "Filmes em alta"),
        series: empty_on_error(series, "Séries em alta"),
        channels,
    })
}

async fn genres(_viewer: Viewer) -> Json<Vec<Genre>> {
    Json(tmdb::genre_catalog())
}

#[derive(Deserialize)]
struct TrendingQuery {
    #[serde(default = "default_window")]
    window: String,
}

fn default_window() -> String {
    "week".to_string()
}

async fn trending(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path(kind): Path<String>,
    Query(params): Query<TrendingQuery>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let kind = vod_kind(&kind)?;

    let items = match kind {
        ContentKind::Anime => state.tmdb.anime(1).await,
        _ => state.tmdb.trending(kind, &params.window).await,
    };

    Ok(Json(empty_on_error(items, "Em alta")))
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: i32,
}

fn default_page() -> i32 {
    1
}

async fn popular(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path(kind): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let kind = vod_kind(&kind)?;

    let items = match kind {
        ContentKind::Anime => state.tmdb.anime(params.page).await,
        _ => state.tmdb.popular(kind, params.page).await,
    };

    Ok(Json(empty_on_error(items, "Populares")))
}

async fn by_genre(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path((kind, genre_id)): Path<(String, i64)>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let kind = vod_kind(&kind)?;
    let items = state.tmdb.by_genre(kind, genre_id, params.page).await;
    Ok(Json(empty_on_error(items, "Por gênero")))
}

async fn details(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<ContentItem>, AppError> {
    let kind = vod_kind(&kind)?;

    state
        .tmdb
        .details(kind, id)
        .await
        .map(Json)
        .map_err(|_| AppError::NotFound)
}

async fn credits(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<Vec<CastMember>>, AppError> {
    let kind = vod_kind(&kind)?;
    let cast = state.tmdb.credits(kind, id).await;
    Ok(Json(empty_on_error(cast, "Elenco")))
}

async fn reviews(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<Vec<Review>>, AppError> {
    let kind = vod_kind(&kind)?;
    let reviews = state.tmdb.reviews(kind, id).await;
    Ok(Json(empty_on_error(reviews, "Avaliações")))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    _viewer: Viewer,
    Query(params): Query<SearchQuery>,
) -> Json<Vec<ContentItem>> {
    if params.q.trim().len() < 2 {
        return Json(Vec::new());
    }

    Json(empty_on_error(
        state.tmdb.search(params.q.trim()).await,
        "Busca",
    ))
}

async fn episodes(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path((id, season)): Path<(i64, i64)>,
) -> Json<Vec<Episode>> {
    Json(state.tmdb.season_episodes(id, season).await)
}

async fn channels(State(state): State<AppState>, _viewer: Viewer) -> Json<Vec<ContentItem>> {
    Json(state.live.channels().await)
}

async fn channel_categories(State(state): State<AppState>, _viewer: Viewer) -> Json<Vec<String>> {
    Json(state.live.channel_categories().await)
}

async fn sports(State(state): State<AppState>, _viewer: Viewer) -> Json<Vec<ContentItem>> {
    Json(state.live.sports().await)
}

async fn sport_categories(State(state): State<AppState>, _viewer: Viewer) -> Json<Vec<String>> {
    Json(state.live.sport_categories().await)
}

async fn admin_list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.auth.list_users().await?))
}

async fn admin_update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    if !state.auth.update_profile(&id, &body).await? {
        return Err(AppError::NotFound);
    }

    let updated = state
        .auth
        .get_profile(&id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(updated))
}

async fn admin_delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<()>, AppError> {
    if admin.id == id {
        return Err(AppError::BadRequest(
            "Um administrador não pode excluir a própria conta".to_string(),
        ));
    }

    if !state.auth.delete_user(&id).await? {
        return Err(AppError::NotFound);
    }

    Ok(Json(()))
}
