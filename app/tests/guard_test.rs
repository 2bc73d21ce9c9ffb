use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use meu_cinema::auth::{AuthManager, ProfileUpdate, SessionStore};
use meu_cinema::embed::EmbedClient;
use meu_cinema::live::LiveClient;
use meu_cinema::models::{User, UserStatus};
use meu_cinema::tmdb::TmdbClient;
use meu_cinema::{api, db, AppState};

async fn test_app() -> (Router, AppState) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    db::run_migrations(&pool).await.expect("migrations");

    let embed = EmbedClient::new("https://playerflixapi.com");
    let state = AppState {
        db: pool.clone(),
        tmdb: TmdbClient::new("chave-de-teste", embed).expect("tmdb client"),
        live: Arc::new(LiveClient::new("https://x.test/api").expect("live client")),
        auth: Arc::new(AuthManager::new(pool.clone())),
        sessions: Arc::new(SessionStore::new(pool, "segredo-de-teste".to_string())),
    };

    (Router::new().nest("/api", api::routes(state.clone())), state)
}

async fn signed_in(state: &AppState, email: &str) -> (User, String) {
    let user = state.auth.register(email, "senha123").await.expect("register");
    let token = state
        .sessions
        .create_session(&user.id)
        .await
        .expect("session");
    (user, token)
}

async fn block(state: &AppState, user_id: &str) {
    state
        .auth
        .update_profile(
            user_id,
            &ProfileUpdate {
                status: Some(UserStatus::Blocked),
                ..Default::default()
            },
        )
        .await
        .expect("block user");
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn anonymous_request_is_unauthorized() {
    let (app, _state) = test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/api/catalog/genres").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blocked_user_never_reaches_protected_content() {
    let (app, state) = test_app().await;
    let (user, token) = signed_in(&state, "maria@test.dev").await;
    block(&state, &user.id).await;

    let response = app
        .oneshot(get_with_token("/api/catalog/genres", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blocked_admin_still_sees_protected_content() {
    let (app, state) = test_app().await;
    let (admin, token) = signed_in(&state, "admin@test.dev").await;
    block(&state, &admin.id).await;

    let response = app
        .oneshot(get_with_token("/api/catalog/genres", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn blocked_user_can_still_read_own_profile() {
    let (app, state) = test_app().await;
    let (user, token) = signed_in(&state, "joao@test.dev").await;
    block(&state, &user.id).await;

    let response = app
        .oneshot(get_with_token("/api/auth/me", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "blocked");
}

#[tokio::test]
async fn admin_routes_refuse_regular_users() {
    let (app, state) = test_app().await;
    let (_user, token) = signed_in(&state, "ana@test.dev").await;

    let response = app
        .clone()
        .oneshot(get_with_token("/api/admin/users", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (_admin, admin_token) = signed_in(&state, "admin@test.dev").await;
    let response = app
        .oneshot(get_with_token("/api/admin/users", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_login_me_flow() {
    let (app, _state) = test_app().await;

    let register = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "carla@test.dev", "password": "senha123" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "carla@test.dev", "password": "senha123" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let token = body["token"].as_str().expect("token").to_string();
    assert_eq!(body["user"]["email"], "carla@test.dev");

    let response = app
        .oneshot(get_with_token("/api/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "carla@test.dev");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn wrong_password_is_a_user_facing_error() {
    let (app, state) = test_app().await;
    signed_in(&state, "pedro@test.dev").await;

    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "pedro@test.dev", "password": "errada" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(login).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "E-mail ou senha inválidos");
}
