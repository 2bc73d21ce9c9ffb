use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog entry variant. Movie/Series/Anime come from the metadata
/// provider, Channel/Sport from the live-source aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
    Anime,
    Channel,
    Sport,
}

impl ContentKind {
    pub fn is_live(&self) -> bool {
        matches!(self, ContentKind::Channel | ContentKind::Sport)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "movie" | "filme" => Some(ContentKind::Movie),
            "series" | "serie" | "tv" => Some(ContentKind::Series),
            "anime" => Some(ContentKind::Anime),
            "channel" | "canal" => Some(ContentKind::Channel),
            "sport" | "esporte" => Some(ContentKind::Sport),
            _ => None,
        }
    }
}

/// Ephemeral catalog view-model, rebuilt on every fetch and never persisted.
///
/// An empty `video_url` means "not yet playable" (series resolve per episode,
/// live items may fail stream discovery). Consumers render it as such, it is
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub tmdb_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub poster_url: String,
    pub backdrop_url: String,
    pub video_url: String,
    pub genre: String,
    pub year: i32,
    /// Formatted event time, sports only.
    pub event_time: Option<String>,
    pub kind: ContentKind,
    pub is_live: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub series_id: String,
    pub title: String,
    pub season: i64,
    pub number: i64,
    pub video_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Blocked,
    PendingPayment,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Blocked => "blocked",
            UserStatus::PendingPayment => "pending_payment",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "blocked" => UserStatus::Blocked,
            "pending_payment" => UserStatus::PendingPayment,
            _ => UserStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub age: Option<i64>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Role and status are independent axes: an admin passes even when the
    /// subscription says blocked.
    pub fn can_watch(&self) -> bool {
        self.role == UserRole::Admin || self.status != UserStatus::Blocked
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub character: String,
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub content: String,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}
