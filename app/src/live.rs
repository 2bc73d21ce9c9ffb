//! Live-source aggregation pipeline.
//!
//! The channel/sports provider has no stable schema and no CORS headers, so
//! this module does three things in sequence: fetch the listing JSON through
//! an ordered chain of sources (direct, then public CORS relays), normalize
//! whatever payload wrapper came back into an item array, and dig a playable
//! stream URL out of each item by key heuristics. Every stage degrades to
//! empty instead of erroring.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{ContentItem, ContentKind};

/// Depth limit for stream discovery. Keys nested deeper than this are never
/// inspected.
const MAX_SEARCH_DEPTH: usize = 5;

/// Keys tried first, in order, on every object level.
const PRIORITY_KEYS: &[&str] = &[
    "embed_url", "embed", "iframe", "stream_url", "url", "link", "m3u8", "source", "stream",
    "play_url", "video_url", "secure_url",
];

/// Wrapper keys the provider has been seen using around its item array.
const WRAPPER_KEYS: &[&str] = &[
    "results", "data", "channels", "sports", "items", "list", "entries",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".bmp", ".ico",
];

/// Substrings that mark a plain URL as stream-like. Required for strings
/// found outside the priority keys to cut down false positives.
const STREAM_HINTS: &[&str] = &[".m3u8", ".mp4", "/live/", "/hls/", "/embed/", "playerflixapi"];

/// Public relays that wrap an arbitrary URL and answer with CORS headers.
const CORS_PROXIES: &[&str] = &["https://api.allorigins.win/raw?url=", "https://corsproxy.io/?"];

static IFRAME_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)src\s*=\s*["']([^"']+)["']"#).expect("valid iframe regex"));

/// Fetches a URL and parses the body as JSON. Split out as a trait so the
/// relay fallback chain can be exercised without a network.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> anyhow::Result<Value>;
}

struct HttpFetcher {
    client: Client,
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> anyhow::Result<Value> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("unexpected status {}", response.status()));
        }

        Ok(response.json().await?)
    }
}

/// Heuristic stream extraction seam. The default implementation is a
/// schema-less key search; swap it for a real client once the provider
/// publishes one.
pub trait StreamLocator: Send + Sync {
    fn locate(&self, raw: &Value) -> Option<String>;
}

/// Bounded-depth recursive key search over an untyped item.
pub struct DeepKeyLocator;

impl StreamLocator for DeepKeyLocator {
    fn locate(&self, raw: &Value) -> Option<String> {
        search(raw, 0)
    }
}

fn search(value: &Value, depth: usize) -> Option<String> {
    if depth >= MAX_SEARCH_DEPTH {
        return None;
    }

    match value {
        Value::String(text) => accept_hinted(text),
        Value::Object(map) => {
            for key in PRIORITY_KEYS {
                if let Some(Value::String(text)) = map.get(*key) {
                    if let Some(url) = accept_candidate(text) {
                        return Some(url);
                    }
                }
            }

            // Priority keys missed: exhaustive scan one level down. String
            // values already tried above are skipped.
            for (key, child) in map {
                if child.is_string() && PRIORITY_KEYS.contains(&key.as_str()) {
                    continue;
                }
                if let Some(url) = search(child, depth + 1) {
                    return Some(url);
                }
            }

            None
        }
        Value::Array(items) => items.iter().find_map(|item| search(item, depth + 1)),
        _ => None,
    }
}

/// Acceptance for priority-keyed strings: an iframe tag yields its `src`, a
/// plain URL passes if it is http(s)/protocol-relative and not an image.
fn accept_candidate(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if trimmed.contains("<iframe") {
        return iframe_src(trimmed);
    }

    if looks_like_url(trimmed) && !is_image(trimmed) {
        return Some(trimmed.to_string());
    }

    None
}

/// Stricter acceptance for strings found outside the priority keys: the URL
/// must additionally carry a stream hint.
fn accept_hinted(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if trimmed.contains("<iframe") {
        return iframe_src(trimmed);
    }

    let candidate = accept_candidate(trimmed)?;
    let lower = candidate.to_lowercase();
    if STREAM_HINTS.iter().any(|hint| lower.contains(hint)) {
        Some(candidate)
    } else {
        None
    }
}

fn iframe_src(tag: &str) -> Option<String> {
    IFRAME_SRC_RE
        .captures(tag)
        .map(|captures| captures[1].to_string())
        .filter(|src| looks_like_url(src))
}

fn looks_like_url(text: &str) -> bool {
    text.starts_with("http") || text.starts_with("//")
}

fn is_image(url: &str) -> bool {
    let lower = url.to_lowercase();
    let path = lower.split('?').next().unwrap_or(&lower);
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Images are always assumed fetchable over https.
pub fn sanitize_image_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if let Some(rest) = url.strip_prefix("http://") {
        return format!("https://{}", rest);
    }
    url.to_string()
}

/// Video links only get the protocol-relative fix. Plain http is left alone:
/// several sources serve streams over http only and an https upgrade breaks
/// playback.
pub fn sanitize_video_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    url.to_string()
}

/// Normalize the provider payload into an item array under a fixed wrapper
/// precedence, accepting bare arrays and single objects as well.
pub fn extract_items(payload: &Value) -> Vec<Value> {
    if let Some(items) = payload.as_array() {
        return items.clone();
    }

    if let Some(map) = payload.as_object() {
        for key in WRAPPER_KEYS {
            if let Some(Value::Array(items)) = map.get(*key) {
                return items.clone();
            }
        }
        return vec![payload.clone()];
    }

    Vec::new()
}

fn cache_bust(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_={}", url, separator, Utc::now().timestamp_millis())
}

fn attempt_urls(url: &str) -> Vec<String> {
    let mut attempts = Vec::with_capacity(1 + CORS_PROXIES.len());
    attempts.push(cache_bust(url));
    for proxy in CORS_PROXIES {
        attempts.push(format!("{}{}", proxy, urlencoding::encode(url)));
    }
    attempts
}

pub struct LiveClient {
    fetcher: Box<dyn JsonFetcher>,
    locator: Box<dyn StreamLocator>,
    base_url: String,
}

impl LiveClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self::with_parts(
            base_url,
            Box::new(HttpFetcher { client }),
            Box::new(DeepKeyLocator),
        ))
    }

    pub fn with_parts(
        base_url: &str,
        fetcher: Box<dyn JsonFetcher>,
        locator: Box<dyn StreamLocator>,
    ) -> Self {
        Self {
            fetcher,
            locator,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn channels(&self) -> Vec<ContentItem> {
        self.listing("channels", ContentKind::Channel).await
    }

    pub async fn sports(&self) -> Vec<ContentItem> {
        self.listing("sports", ContentKind::Sport).await
    }

    pub async fn channel_categories(&self) -> Vec<String> {
        self.categories("channels").await
    }

    pub async fn sport_categories(&self) -> Vec<String> {
        self.categories("sports").await
    }

    async fn listing(&self, path: &str, kind: ContentKind) -> Vec<ContentItem> {
        let url = format!("{}/{}", self.base_url, path);

        let Some(payload) = self.fetch_with_fallback(&url).await else {
            return Vec::new();
        };

        let items: Vec<ContentItem> = extract_items(&payload)
            .iter()
            .map(|raw| self.map_item(raw, kind))
            .collect();

        debug!("Normalized {} live items from {}", items.len(), url);
        items
    }

    async fn categories(&self, path: &str) -> Vec<String> {
        let url = format!("{}/{}/categories", self.base_url, path);

        let Some(payload) = self.fetch_with_fallback(&url).await else {
            return Vec::new();
        };

        extract_items(&payload)
            .iter()
            .filter_map(category_name)
            .collect()
    }

    /// Direct fetch first (with a cache-busting param), then each CORS relay
    /// in order. First parseable JSON wins; when everything fails the caller
    /// gets nothing and renders an empty listing.
    async fn fetch_with_fallback(&self, url: &str) -> Option<Value> {
        for (attempt, target) in attempt_urls(url).iter().enumerate() {
            match self.fetcher.fetch_json(target).await {
                Ok(payload) => {
                    if attempt > 0 {
                        debug!("Relay {} served {}", attempt, url);
                    }
                    return Some(payload);
                }
                Err(e) => debug!("Attempt {} for {} failed: {}", attempt + 1, url, e),
            }
        }

        warn!("All sources for {} failed, listing degrades to empty", url);
        None
    }

    fn map_item(&self, raw: &Value, kind: ContentKind) -> ContentItem {
        let created_at = Utc::now();

        let title = first_string(raw, &["name", "title", "channel", "nome"])
            .unwrap_or_else(|| "Sem nome".to_string());

        let id = first_string(raw, &["id", "channel_id", "slug"])
            .unwrap_or_else(|| title.to_lowercase().replace(' ', "-"));

        let description =
            first_string(raw, &["description", "desc", "descricao"]).unwrap_or_else(|| title.clone());

        let genre = first_string(raw, &["category", "group", "genre", "categoria"])
            .unwrap_or_else(|| match kind {
                ContentKind::Sport => "Esportes".to_string(),
                _ => "TV Ao Vivo".to_string(),
            });

        let poster_url = sanitize_image_url(
            &first_string(raw, &["logo", "image", "poster", "thumbnail", "img"]).unwrap_or_default(),
        );

        let video_url = self
            .locator
            .locate(raw)
            .map(|url| sanitize_video_url(&url))
            .unwrap_or_default();

        let event_time = if kind == ContentKind::Sport {
            event_time(raw)
        } else {
            None
        };

        ContentItem {
            id,
            tmdb_id: None,
            title,
            description,
            backdrop_url: poster_url.clone(),
            poster_url,
            video_url,
            genre,
            year: created_at.year(),
            event_time,
            kind,
            is_live: true,
            created_at,
        }
    }
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    let map = raw.as_object()?;

    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn category_name(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => Some(text.clone()),
        _ => first_string(raw, &["name", "title", "category", "categoria"]),
    }
}

fn event_time(raw: &Value) -> Option<String> {
    if let Some(text) = first_string(raw, &["time", "hora", "start_time", "kickoff", "data"]) {
        return Some(text);
    }

    for key in ["timestamp", "start", "start_at"] {
        if let Some(seconds) = raw.get(key).and_then(Value::as_i64) {
            if let Some(when) = Utc.timestamp_opt(seconds, 0).single() {
                return Some(when.format("%d/%m %H:%M").to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn locate(value: &Value) -> String {
        DeepKeyLocator.locate(value).unwrap_or_default()
    }

    #[test]
    fn priority_key_yields_stream() {
        let raw = json!({ "embed_url": "https://x.test/a.m3u8" });
        assert_eq!(locate(&raw), "https://x.test/a.m3u8");
    }

    #[test]
    fn image_only_item_yields_nothing() {
        let raw = json!({ "logo": "https://x.test/a.png" });
        assert_eq!(locate(&raw), "");
    }

    #[test]
    fn priority_key_rejects_image_value() {
        let raw = json!({ "url": "https://x.test/cover.jpg?v=2" });
        assert_eq!(locate(&raw), "");
    }

    #[test]
    fn iframe_markup_yields_its_src() {
        let raw = json!({ "embed": "<iframe width=\"640\" src='https://x.test/embed/9'></iframe>" });
        assert_eq!(locate(&raw), "https://x.test/embed/9");
    }

    #[test]
    fn nested_hinted_url_is_found() {
        let raw = json!({ "media": { "playback": "https://x.test/hls/index.m3u8" } });
        assert_eq!(locate(&raw), "https://x.test/hls/index.m3u8");
    }

    #[test]
    fn nested_plain_url_without_hint_is_rejected() {
        let raw = json!({ "media": { "homepage": "https://x.test/about" } });
        assert_eq!(locate(&raw), "");
    }

    #[test]
    fn priority_key_inside_nested_object_is_found() {
        let raw = json!({ "source": { "stream_url": "//cdn.test/live/1" } });
        assert_eq!(locate(&raw), "//cdn.test/live/1");
    }

    #[test]
    fn arrays_are_searched() {
        let raw = json!({ "sources": [{ "file": "nope" }, { "m3u8": "https://x.test/b.m3u8" }] });
        assert_eq!(locate(&raw), "https://x.test/b.m3u8");
    }

    #[test]
    fn depth_limit_is_enforced() {
        let found = json!({ "a": { "b": { "c": { "d": { "embed_url": "https://x.test/a.m3u8" } } } } });
        assert_eq!(locate(&found), "https://x.test/a.m3u8");

        let too_deep =
            json!({ "a": { "b": { "c": { "d": { "e": { "embed_url": "https://x.test/a.m3u8" } } } } } });
        assert_eq!(locate(&too_deep), "");
    }

    #[test]
    fn image_urls_are_upgraded_to_https() {
        assert_eq!(sanitize_image_url("//cdn.test/a.jpg"), "https://cdn.test/a.jpg");
        assert_eq!(
            sanitize_image_url("http://cdn.test/a.jpg"),
            "https://cdn.test/a.jpg"
        );
        assert_eq!(
            sanitize_image_url("https://cdn.test/a.jpg"),
            "https://cdn.test/a.jpg"
        );
        assert_eq!(sanitize_image_url(""), "");
    }

    #[test]
    fn video_urls_keep_plain_http() {
        assert_eq!(
            sanitize_video_url("http://cdn.test/a.m3u8"),
            "http://cdn.test/a.m3u8"
        );
        assert_eq!(
            sanitize_video_url("//cdn.test/a.m3u8"),
            "https://cdn.test/a.m3u8"
        );
    }

    #[test]
    fn wrapper_precedence_is_fixed() {
        let both = json!({ "data": [{ "name": "b" }], "results": [{ "name": "a" }] });
        let items = extract_items(&both);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "a");
    }

    #[test]
    fn bare_arrays_and_single_objects_normalize() {
        assert_eq!(extract_items(&json!([{ "name": "a" }, { "name": "b" }])).len(), 2);
        assert_eq!(extract_items(&json!({ "name": "solo" })).len(), 1);
        assert!(extract_items(&json!("texto")).is_empty());
        assert!(extract_items(&json!(null)).is_empty());
    }

    #[test]
    fn cache_bust_respects_existing_query() {
        assert!(cache_bust("https://x.test/channels").contains("/channels?_="));
        assert!(cache_bust("https://x.test/channels?page=2").contains("page=2&_="));
    }

    #[test]
    fn attempts_are_direct_then_relays() {
        let attempts = attempt_urls("https://x.test/channels");
        assert_eq!(attempts.len(), 3);
        assert!(attempts[0].starts_with("https://x.test/channels?_="));
        assert!(attempts[1].starts_with("https://api.allorigins.win/raw?url=https%3A%2F%2F"));
        assert!(attempts[2].starts_with("https://corsproxy.io/?https%3A%2F%2F"));
    }

    /// Fails a fixed number of leading attempts, then serves one payload.
    struct FlakyFetcher {
        failures: usize,
        payload: Value,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JsonFetcher for FlakyFetcher {
        async fn fetch_json(&self, _url: &str) -> anyhow::Result<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                anyhow::bail!("connection refused");
            }
            Ok(self.payload.clone())
        }
    }

    fn client_with(failures: usize, payload: Value) -> LiveClient {
        LiveClient::with_parts(
            "https://x.test/api",
            Box::new(FlakyFetcher {
                failures,
                payload,
                calls: AtomicUsize::new(0),
            }),
            Box::new(DeepKeyLocator),
        )
    }

    #[tokio::test]
    async fn second_relay_success_still_returns_items() {
        let client = client_with(
            2,
            json!({ "channels": [{
                "name": "ESPN Brasil",
                "logo": "//cdn.test/espn.png",
                "embed_url": "http://cdn.test/espn/index.m3u8"
            }] }),
        );

        let channels = client.channels().await;
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].title, "ESPN Brasil");
        assert_eq!(channels[0].poster_url, "https://cdn.test/espn.png");
        // http video source survives untouched
        assert_eq!(channels[0].video_url, "http://cdn.test/espn/index.m3u8");
        assert!(channels[0].is_live);
    }

    #[tokio::test]
    async fn exhausted_relays_degrade_to_empty() {
        let client = client_with(3, json!({ "channels": [] }));
        assert!(client.channels().await.is_empty());
    }

    #[tokio::test]
    async fn sports_carry_event_time() {
        let client = client_with(
            0,
            json!({ "sports": [{
                "title": "Flamengo x Palmeiras",
                "category": "Futebol",
                "hora": "21:30",
                "stream_url": "https://cdn.test/live/fla.m3u8"
            }] }),
        );

        let sports = client.sports().await;
        assert_eq!(sports.len(), 1);
        assert_eq!(sports[0].event_time.as_deref(), Some("21:30"));
        assert_eq!(sports[0].genre, "Futebol");
        assert_eq!(sports[0].kind, ContentKind::Sport);
    }

    #[tokio::test]
    async fn categories_accept_strings_and_objects() {
        let client = client_with(0, json!({ "data": ["Notícias", { "name": "Filmes" }] }));
        assert_eq!(client.channel_categories().await, vec!["Notícias", "Filmes"]);
    }
}
