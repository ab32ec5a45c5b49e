use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub http_timeout_secs: u64,
    pub jwt_secret: Option<String>,
    pub token: Option<String>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let api_url = env::var("CAMPUS_API_URL")
            .map_err(|_| AppError::Config("CAMPUS_API_URL is not set".to_string()))?;

        Ok(Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_timeout_secs: env::var("CAMPUS_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            jwt_secret: env::var("CAMPUS_JWT_SECRET").ok().filter(|s| !s.is_empty()),
            token: env::var("CAMPUS_TOKEN").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
