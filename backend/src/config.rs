use anyhow::Context;
use dotenv::dotenv;
use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Base URL of the media CDN API, e.g. `https://api.cdn.example/v1/ikaze`.
    pub cdn_url: String,
    pub cdn_api_key: String,
}

impl AppConfig {
    /// Loads the configuration from the environment once at startup.
    /// A missing required variable fails the whole process here instead
    /// of surfacing as a 500 on the first request that needs it.
    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            cdn_url: env::var("CDN_URL").context("CDN_URL must be set")?,
            cdn_api_key: env::var("CDN_API_KEY").context("CDN_API_KEY must be set")?,
        })
    }
}
