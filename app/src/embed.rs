use tracing::debug;

/// Link generator for the external embed service.
///
/// The service exposes an implicit URL convention rather than an API: a movie
/// plays at `{base}/movie/{id}` and an episode at
/// `{base}/tv/{id}/{season}/{episode}`. Formatting always succeeds; whether
/// the embed actually resolves is only observable inside the player.
#[derive(Debug, Clone)]
pub struct EmbedClient {
    base_url: String,
}

impl EmbedClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn movie_url(&self, tmdb_id: i64) -> String {
        let url = format!("{}/movie/{}", self.base_url, tmdb_id);
        debug!("Generated movie embed URL: {}", url);
        url
    }

    pub fn episode_url(&self, tmdb_id: i64, season: i64, episode: i64) -> String {
        let url = format!("{}/tv/{}/{}/{}", self.base_url, tmdb_id, season, episode);
        debug!("Generated episode embed URL: {}", url);
        url
    }
}
