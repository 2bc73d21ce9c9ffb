use config::{Config as ConfigBuilder, File};
use serde::Deserialize;

const DEFAULT_EMBED_BASE_URL: &str = "https://playerflixapi.com";
const DEFAULT_LIVE_API_URL: &str = "https://playerflixapi.com/api";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub tmdb_api_key: String,
    pub embed_base_url: String,
    pub live_api_url: String,
    pub session_secret: String,
    pub port: u16,
}

impl Config {
    pub fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = ConfigBuilder::builder()
            .add_source(File::with_name("config").required(false))
            .set_default("database_url", "sqlite://./meucinema.db?mode=rwc")?
            .set_default("embed_base_url", DEFAULT_EMBED_BASE_URL)?
            .set_default("live_api_url", DEFAULT_LIVE_API_URL)?
            .set_default("port", 3000u16)?
            .build()?;

        let from_env_or_file = |env_key: &str, file_key: &str, fallback: &str| {
            std::env::var(env_key).unwrap_or_else(|_| {
                config
                    .get_string(file_key)
                    .unwrap_or_else(|_| fallback.to_string())
            })
        };

        Ok(Config {
            database_url: from_env_or_file(
                "DATABASE_URL",
                "database_url",
                "sqlite://./meucinema.db?mode=rwc",
            ),
            tmdb_api_key: std::env::var("TMDB_API_KEY")
                .map_err(|_| anyhow::anyhow!("TMDB_API_KEY environment variable not set"))?,
            embed_base_url: from_env_or_file(
                "EMBED_BASE_URL",
                "embed_base_url",
                DEFAULT_EMBED_BASE_URL,
            ),
            live_api_url: from_env_or_file("LIVE_API_URL", "live_api_url", DEFAULT_LIVE_API_URL),
            session_secret: std::env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "troque-esta-chave-de-32-bytes-em-producao".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| config.get_int("port").unwrap_or(3000) as u16),
        })
    }
}
