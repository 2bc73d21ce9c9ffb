use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embed::EmbedClient;
use crate::models::{CastMember, ContentItem, ContentKind, Episode, Genre, Review};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const LANGUAGE: &str = "pt-BR";

/// Year assumed when the provider sends no usable date.
const DEFAULT_YEAR: i32 = 2024;

/// TMDB genre id to label. First matching id wins, anything unknown maps to
/// "Geral".
const GENRE_LABELS: &[(i64, &str)] = &[
    (28, "Ação"),
    (12, "Aventura"),
    (16, "Animação"),
    (35, "Comédia"),
    (80, "Crime"),
    (99, "Documentário"),
    (18, "Drama"),
    (10751, "Família"),
    (14, "Fantasia"),
    (36, "História"),
    (27, "Terror"),
    (10402, "Música"),
    (9648, "Mistério"),
    (10749, "Romance"),
    (878, "Ficção Científica"),
    (10770, "Cinema TV"),
    (53, "Suspense"),
    (10752, "Guerra"),
    (37, "Faroeste"),
    (10759, "Ação & Aventura"),
    (10762, "Kids"),
    (10763, "News"),
    (10764, "Reality"),
    (10765, "Sci-Fi & Fantasy"),
    (10766, "Soap"),
    (10767, "Talk"),
    (10768, "War & Politics"),
];

const FALLBACK_GENRE: &str = "Geral";

/// TMDB genre id used when browsing the anime catalog (animation).
const ANIME_GENRE_ID: i64 = 16;

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    embed: EmbedClient,
}

impl TmdbClient {
    pub fn new(api_key: &str, embed: EmbedClient) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            embed,
        })
    }

    fn auth_header(&self) -> String {
        if self.api_key.starts_with("Bearer ") {
            self.api_key.clone()
        } else {
            format!("Bearer {}", self.api_key)
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", TMDB_BASE_URL, path);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(&[("language", LANGUAGE)])
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("TMDB error on {}: {} {}", path, status, error_text);
            return Err(anyhow::anyhow!("TMDB API error: {}", status));
        }

        Ok(response.json().await?)
    }

    pub async fn trending(
        &self,
        kind: ContentKind,
        window: &str,
    ) -> anyhow::Result<Vec<ContentItem>> {
        debug!("Fetching trending {:?} ({})", kind, window);
        let path = format!("/trending/{}/{}", media_path(kind), window);
        let page: ListResponse = self.get_json(&path, &[]).await?;
        Ok(self.map_results(page.results, kind))
    }

    pub async fn popular(&self, kind: ContentKind, page: i32) -> anyhow::Result<Vec<ContentItem>> {
        let path = format!("/{}/popular", media_path(kind));
        let list: ListResponse = self
            .get_json(&path, &[("page", page.to_string())])
            .await?;
        Ok(self.map_results(list.results, kind))
    }

    pub async fn by_genre(
        &self,
        kind: ContentKind,
        genre_id: i64,
        page: i32,
    ) -> anyhow::Result<Vec<ContentItem>> {
        let path = format!("/discover/{}", media_path(kind));
        let list: ListResponse = self
            .get_json(
                &path,
                &[
                    ("with_genres", genre_id.to_string()),
                    ("sort_by", "popularity.desc".to_string()),
                    ("page", page.to_string()),
                    ("include_adult", "false".to_string()),
                ],
            )
            .await?;
        Ok(self.map_results(list.results, kind))
    }

    /// Anime is TV discovery restricted to the animation genre.
    pub async fn anime(&self, page: i32) -> anyhow::Result<Vec<ContentItem>> {
        self.by_genre(ContentKind::Anime, ANIME_GENRE_ID, page).await
    }

    pub async fn search(&self, query: &str) -> anyhow::Result<Vec<ContentItem>> {
        debug!("Searching TMDB for: {}", query);
        let list: ListResponse = self
            .get_json(
                "/search/multi",
                &[
                    ("query", query.to_string()),
                    ("include_adult", "false".to_string()),
                ],
            )
            .await?;

        let items = list
            .results
            .into_iter()
            .filter_map(|record| {
                let kind = match record.media_type.as_deref() {
                    Some("movie") => ContentKind::Movie,
                    Some("tv") => ContentKind::Series,
                    _ => return None,
                };
                Some(map_media(&record, kind, &self.embed))
            })
            .filter(|item| !item.poster_url.is_empty())
            .collect();

        Ok(items)
    }

    pub async fn details(&self, kind: ContentKind, id: i64) -> anyhow::Result<ContentItem> {
        let path = format!("/{}/{}", media_path(kind), id);
        let record: MediaRecord = self.get_json(&path, &[]).await?;
        Ok(map_media(&record, kind, &self.embed))
    }

    pub async fn credits(&self, kind: ContentKind, id: i64) -> anyhow::Result<Vec<CastMember>> {
        let path = format!("/{}/{}/credits", media_path(kind), id);
        let credits: CreditsResponse = self.get_json(&path, &[]).await?;

        Ok(credits
            .cast
            .into_iter()
            .take(10)
            .map(|member| CastMember {
                name: member.name,
                character: member.character.unwrap_or_default(),
                profile_url: member
                    .profile_path
                    .map(|p| format!("{}/w200{}", TMDB_IMAGE_BASE, p)),
            })
            .collect())
    }

    pub async fn reviews(&self, kind: ContentKind, id: i64) -> anyhow::Result<Vec<Review>> {
        let path = format!("/{}/{}/reviews", media_path(kind), id);
        let reviews: ReviewsResponse = self.get_json(&path, &[]).await?;

        Ok(reviews
            .results
            .into_iter()
            .take(5)
            .map(|review| Review {
                author: review.author,
                content: review.content,
                rating: review.author_details.and_then(|d| d.rating),
            })
            .collect())
    }

    /// Fetch one season's episode list and synthesize per-episode links.
    ///
    /// Provider order is preserved (TMDB already returns season/episode
    /// order). Any failure yields an empty list rather than an error, the
    /// caller renders "no episodes".
    pub async fn season_episodes(&self, series_id: i64, season: i64) -> Vec<Episode> {
        let path = format!("/tv/{}/season/{}", series_id, season);
        let response: anyhow::Result<SeasonResponse> = self.get_json(&path, &[]).await;

        match response {
            Ok(data) => data
                .episodes
                .unwrap_or_default()
                .into_iter()
                .map(|ep| Episode {
                    id: ep.id.to_string(),
                    series_id: series_id.to_string(),
                    title: ep.name.unwrap_or_default(),
                    season,
                    number: ep.episode_number,
                    video_url: self.embed.episode_url(series_id, season, ep.episode_number),
                })
                .collect(),
            Err(e) => {
                debug!("Season {} of {} unavailable: {}", season, series_id, e);
                Vec::new()
            }
        }
    }

    fn map_results(&self, results: Vec<MediaRecord>, kind: ContentKind) -> Vec<ContentItem> {
        results
            .iter()
            .map(|record| map_media(record, kind, &self.embed))
            .collect()
    }
}

/// The catalog taxonomy exposed to clients, straight from the static table.
pub fn genre_catalog() -> Vec<Genre> {
    GENRE_LABELS
        .iter()
        .map(|(id, name)| Genre {
            id: *id,
            name: (*name).to_string(),
        })
        .collect()
}

fn genre_label(ids: &[i64]) -> &'static str {
    ids.first()
        .and_then(|first| {
            GENRE_LABELS
                .iter()
                .find(|(id, _)| id == first)
                .map(|(_, name)| *name)
        })
        .unwrap_or(FALLBACK_GENRE)
}

fn media_path(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Movie => "movie",
        _ => "tv",
    }
}

/// Map a raw metadata record into a catalog entry. Pure transform, no I/O.
///
/// A playable link is synthesized only for movies; series and anime stay
/// empty at the top level because their playable units are episodes.
pub fn map_media(record: &MediaRecord, kind: ContentKind, embed: &EmbedClient) -> ContentItem {
    let title = record
        .title
        .clone()
        .or_else(|| record.name.clone())
        .unwrap_or_default();

    let description = record
        .overview
        .clone()
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "Sinopse indisponível.".to_string());

    let poster_url = record
        .poster_path
        .as_deref()
        .map(|p| format!("{}/w500{}", TMDB_IMAGE_BASE, p))
        .unwrap_or_default();

    let backdrop_url = record
        .backdrop_path
        .as_deref()
        .map(|p| format!("{}/original{}", TMDB_IMAGE_BASE, p))
        .unwrap_or_default();

    let year = record
        .release_date
        .as_deref()
        .or(record.first_air_date.as_deref())
        .and_then(|date| date.get(..4))
        .and_then(|y| y.parse().ok())
        .unwrap_or(DEFAULT_YEAR);

    let genre = record
        .genres
        .as_ref()
        .and_then(|list| list.first())
        .map(|g| g.name.clone())
        .unwrap_or_else(|| genre_label(record.genre_ids.as_deref().unwrap_or(&[])).to_string());

    let video_url = if kind == ContentKind::Movie {
        embed.movie_url(record.id)
    } else {
        String::new()
    };

    ContentItem {
        id: record.id.to_string(),
        tmdb_id: Some(record.id),
        title,
        description,
        poster_url,
        backdrop_url,
        video_url,
        genre,
        year,
        event_time: None,
        kind,
        is_live: false,
        created_at: Utc::now(),
    }
}

/// Raw TMDB record, shared between list and detail payloads: lists carry
/// `genre_ids`, details carry an expanded `genres` array.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaRecord {
    pub id: i64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub genre_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub genres: Option<Vec<GenreEntry>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenreEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<MediaRecord>,
}

#[derive(Debug, Deserialize)]
struct SeasonResponse {
    #[serde(default)]
    episodes: Option<Vec<EpisodeRecord>>,
}

#[derive(Debug, Deserialize)]
struct EpisodeRecord {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    episode_number: i64,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    cast: Vec<CastRecord>,
}

#[derive(Debug, Deserialize)]
struct CastRecord {
    name: String,
    #[serde(default)]
    character: Option<String>,
    #[serde(default)]
    profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    #[serde(default)]
    results: Vec<ReviewRecord>,
}

#[derive(Debug, Deserialize)]
struct ReviewRecord {
    author: String,
    content: String,
    #[serde(default)]
    author_details: Option<AuthorDetails>,
}

#[derive(Debug, Deserialize)]
struct AuthorDetails {
    #[serde(default)]
    rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embed() -> EmbedClient {
        EmbedClient::new("https://playerflixapi.com")
    }

    fn record(id: i64) -> MediaRecord {
        MediaRecord {
            id,
            media_type: None,
            title: Some("Clube da Luta".to_string()),
            name: None,
            overview: Some("Um homem sem nome.".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
            backdrop_path: Some("/backdrop.jpg".to_string()),
            release_date: Some("1999-10-15".to_string()),
            first_air_date: None,
            genre_ids: Some(vec![18, 53]),
            genres: None,
        }
    }

    #[test]
    fn movie_gets_synthesized_link() {
        let item = map_media(&record(550), ContentKind::Movie, &embed());
        assert_eq!(item.video_url, "https://playerflixapi.com/movie/550");
        assert_eq!(item.id, "550");
    }

    #[test]
    fn series_link_is_empty_at_top_level() {
        let item = map_media(&record(550), ContentKind::Series, &embed());
        assert_eq!(item.video_url, "");
        let item = map_media(&record(550), ContentKind::Anime, &embed());
        assert_eq!(item.video_url, "");
    }

    #[test]
    fn missing_genre_fields_fall_back_to_geral() {
        let mut rec = record(1);
        rec.genre_ids = None;
        rec.genres = None;
        let item = map_media(&rec, ContentKind::Movie, &embed());
        assert_eq!(item.genre, "Geral");

        rec.genre_ids = Some(vec![]);
        let item = map_media(&rec, ContentKind::Movie, &embed());
        assert_eq!(item.genre, "Geral");
    }

    #[test]
    fn unknown_genre_id_falls_back_to_geral() {
        let mut rec = record(1);
        rec.genre_ids = Some(vec![424242]);
        let item = map_media(&rec, ContentKind::Movie, &embed());
        assert_eq!(item.genre, "Geral");
    }

    #[test]
    fn first_genre_id_decides_the_label() {
        let item = map_media(&record(1), ContentKind::Movie, &embed());
        assert_eq!(item.genre, "Drama");
    }

    #[test]
    fn explicit_genres_take_precedence_over_ids() {
        let mut rec = record(1);
        rec.genres = Some(vec![GenreEntry {
            id: 27,
            name: "Terror".to_string(),
        }]);
        let item = map_media(&rec, ContentKind::Movie, &embed());
        assert_eq!(item.genre, "Terror");
    }

    #[test]
    fn title_falls_back_to_name() {
        let mut rec = record(1);
        rec.title = None;
        rec.name = Some("Dark".to_string());
        let item = map_media(&rec, ContentKind::Series, &embed());
        assert_eq!(item.title, "Dark");
    }

    #[test]
    fn year_parses_date_prefix_or_defaults() {
        let item = map_media(&record(1), ContentKind::Movie, &embed());
        assert_eq!(item.year, 1999);

        let mut rec = record(1);
        rec.release_date = None;
        rec.first_air_date = Some("2017-12-01".to_string());
        let item = map_media(&rec, ContentKind::Series, &embed());
        assert_eq!(item.year, 2017);

        rec.first_air_date = None;
        let item = map_media(&rec, ContentKind::Series, &embed());
        assert_eq!(item.year, DEFAULT_YEAR);
    }

    #[test]
    fn empty_overview_gets_placeholder() {
        let mut rec = record(1);
        rec.overview = Some(String::new());
        let item = map_media(&rec, ContentKind::Movie, &embed());
        assert_eq!(item.description, "Sinopse indisponível.");
    }

    #[test]
    fn missing_images_stay_empty() {
        let mut rec = record(1);
        rec.poster_path = None;
        rec.backdrop_path = None;
        let item = map_media(&rec, ContentKind::Movie, &embed());
        assert_eq!(item.poster_url, "");
        assert_eq!(item.backdrop_url, "");
    }

    #[test]
    fn genre_catalog_is_complete() {
        let catalog = genre_catalog();
        assert_eq!(catalog.len(), GENRE_LABELS.len());
        assert!(catalog.iter().any(|g| g.id == 878 && g.name == "Ficção Científica"));
    }
}
