use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Base URL of the managed backend (record store + functions).
    pub backend_url: String,
    /// Public (anon) API key sent as `apikey`.
    pub backend_api_key: String,
    /// Signed-in user's session token.
    pub session_token: String,

    pub platform_api_url: String,
    pub platform_cdn_url: String,

    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Rows fetched per account activity query.
    pub activity_limit: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("DECK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("platform_api_url", "https://discord.com/api/v10")?
            .set_default("platform_cdn_url", "https://cdn.discordapp.com")?
            .set_default("request_timeout_secs", 30)?
            .set_default("connect_timeout_secs", 10)?
            .set_default("activity_limit", 20)?
            .build()?;

        config.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}
