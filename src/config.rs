//! Environment-variable based settings.

use std::env;
use std::time::Duration;

/// Server settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    #[allow(dead_code)]
    pub cors_origins: Vec<String>,
    pub room: RoomConfig,
    pub log_level: String,
}

/// Room lifecycle timing.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Window after creation in which an empty provisional room survives
    pub grace_period: Duration,
    /// Window after the last member disconnects before an active room is reaped
    pub empty_timeout: Duration,
}

impl Config {
    /// Load settings from the environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            room: RoomConfig {
                grace_period: Duration::from_secs(
                    env::var("ROOM_GRACE_PERIOD_SECS")
                        .unwrap_or_else(|_| "120".to_string())
                        .parse()
                        .unwrap_or(120),
                ),
                empty_timeout: Duration::from_secs(
                    env::var("ROOM_EMPTY_TIMEOUT_SECS")
                        .unwrap_or_else(|_| "30".to_string())
                        .parse()
                        .unwrap_or(30),
                ),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

#[cfg(test)]
impl Config {
    /// Defaults for unit tests, without touching the environment.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_origins: vec!["*".to_string()],
            room: RoomConfig {
                grace_period: Duration::from_secs(120),
                empty_timeout: Duration::from_secs(30),
            },
            log_level: "debug".to_string(),
        }
    }
}
