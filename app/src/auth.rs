use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::error::AppError;
use crate::models::{User, UserRole, UserStatus};
use crate::AppState;

const SESSION_DAYS: i64 = 7;

#[derive(Debug)]
pub struct SessionStore {
    db: Pool<Sqlite>,
    secret: String,
}

impl SessionStore {
    pub fn new(db: Pool<Sqlite>, secret: String) -> Self {
        Self { db, secret }
    }

    pub async fn create_session(&self, user_id: &str) -> anyhow::Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + Duration::days(SESSION_DAYS)).timestamp();

        let signature = self.create_signature(&session_id, user_id, expires_at);
        let session_token = format!("{}.{}", session_id, signature);

        sqlx::query("INSERT INTO sessions (session_id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.db)
            .await?;

        Ok(session_token)
    }

    /// Resolve a signed token to its user id. Expired rows are deleted on
    /// sight; bad format or signature resolves to None, never an error.
    pub async fn validate_session(&self, session_token: &str) -> anyhow::Result<Option<String>> {
        let Some((session_id, signature)) = session_token.split_once('.') else {
            return Ok(None);
        };

        let session_row: Option<(String, i64)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.db)
                .await?;

        let Some((user_id, expires_at)) = session_row else {
            return Ok(None);
        };

        if expires_at < Utc::now().timestamp() {
            sqlx::query("DELETE FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .execute(&self.db)
                .await?;
            return Ok(None);
        }

        let expected_signature = self.create_signature(session_id, &user_id, expires_at);
        if signature != expected_signature {
            return Ok(None);
        }

        Ok(Some(user_id))
    }

    pub async fn delete_by_token(&self, session_token: &str) -> anyhow::Result<()> {
        if let Some((session_id, _)) = session_token.split_once('.') {
            sqlx::query("DELETE FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .execute(&self.db)
                .await?;
        }
        Ok(())
    }

    fn create_signature(&self, session_id: &str, user_id: &str, expires_at: i64) -> String {
        let message = format!("{}.{}.{}", session_id, user_id, expires_at);
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can accept any key size");
        mac.update(message.as_bytes());
        let result = mac.finalize().into_bytes();
        hex::encode(result)
    }
}

/// Fields an update may touch. Admin routes pass everything through; the
/// self-service route clears role/status before applying.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub age: Option<i64>,
    pub avatar_url: Option<String>,
}

pub struct AuthManager {
    db: Pool<Sqlite>,
}

impl AuthManager {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub async fn register(&self, email: &str, password: &str) -> anyhow::Result<User> {
        let email = email.trim().to_lowercase();

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM profiles WHERE email = ?)")
            .bind(&email)
            .fetch_one(&self.db)
            .await?;

        if exists {
            anyhow::bail!("E-mail já cadastrado");
        }

        let local_part = email.split('@').next().unwrap_or(&email).to_string();
        let role = if local_part.contains("admin") {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let id = uuid::Uuid::new_v4().to_string();
        let password_hash = hash(password, DEFAULT_COST)?;
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO profiles (id, email, name, password_hash, role, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(&local_part)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        info!("Registered profile {} ({})", email, role.as_str());

        Ok(User {
            id,
            email,
            name: local_part,
            role,
            status: UserStatus::Active,
            age: None,
            avatar_url: None,
            created_at,
        })
    }

    /// Password check. `Ok(None)` means unknown email or wrong password; the
    /// caller turns that into a user-facing message.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> anyhow::Result<Option<User>> {
        let email = email.trim().to_lowercase();

        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, password_hash FROM profiles WHERE email = ?")
                .bind(&email)
                .fetch_optional(&self.db)
                .await?;

        let Some((id, password_hash)) = row else {
            return Ok(None);
        };

        if !verify(password, &password_hash)? {
            return Ok(None);
        }

        self.get_profile(&id).await
    }

    pub async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id, email, name, role, status, age, avatar_url, created_at \
             FROM profiles WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(ProfileRow::into_user))
    }

    pub async fn update_profile(&self, user_id: &str, updates: &ProfileUpdate) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET \
             name = COALESCE(?, name), \
             role = COALESCE(?, role), \
             status = COALESCE(?, status), \
             age = COALESCE(?, age), \
             avatar_url = COALESCE(?, avatar_url) \
             WHERE id = ?",
        )
        .bind(updates.name.as_deref())
        .bind(updates.role.map(|r| r.as_str()))
        .bind(updates.status.map(|s| s.as_str()))
        .bind(updates.age)
        .bind(updates.avatar_url.as_deref())
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            "SELECT id, email, name, role, status, age, avatar_url, created_at \
             FROM profiles ORDER BY created_at DESC",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(ProfileRow::into_user).collect())
    }

    pub async fn delete_user(&self, user_id: &str) -> anyhow::Result<bool> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: String,
    email: String,
    name: String,
    role: String,
    status: String,
    age: Option<i64>,
    avatar_url: Option<String>,
    created_at: String,
}

impl ProfileRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            role: UserRole::parse(&self.role),
            status: UserStatus::parse(&self.status),
            age: self.age,
            avatar_url: self.avatar_url,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == "session").then(|| value.to_string())
            })
        })
}

async fn resolve_user(parts: &Parts, state: &AppState) -> Result<User, AppError> {
    let token = session_token(&parts.headers).ok_or(AppError::Unauthorized)?;

    let user_id = state
        .sessions
        .validate_session(&token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    state
        .auth
        .get_profile(&user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Authenticated user, no subscription gate. Profile routes use this so a
/// blocked user can still see their own account state.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(resolve_user(parts, state).await?))
    }
}

/// The protected-content gate: a session must exist and the user must be an
/// admin or not blocked.
pub struct Viewer(pub User);

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = resolve_user(parts, state).await?;

        if !user.can_watch() {
            return Err(AppError::Blocked(
                "Assinatura bloqueada. Fale com o administrador.".to_string(),
            ));
        }

        Ok(Viewer(user))
    }
}

pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = resolve_user(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::AdminOnly);
        }

        Ok(AdminUser(user))
    }
}
