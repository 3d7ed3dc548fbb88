//! Configuration management for Atrium.
//!
//! Loads configuration from environment variables once at startup.

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub votes: VoteConfig,
    /// Users registering with this email get the admin flag.
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub max_age_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct VoteConfig {
    /// How long a roadmap vote counts against repeat votes, in days.
    pub window_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8420").parse().expect("Invalid PORT"),
                public_url: env_or("PUBLIC_URL", "http://localhost:8420"),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/atrium.db"),
            },
            session: SessionConfig {
                secret: env::var("SESSION_SECRET").unwrap_or_else(|_| nanoid::nanoid!(32)),
                max_age_seconds: env_or("SESSION_MAX_AGE", "604800")
                    .parse()
                    .unwrap_or(604800), // 7 days
            },
            votes: VoteConfig {
                window_days: env_or("VOTE_WINDOW_DAYS", "7").parse().unwrap_or(7),
            },
            admin_email: env::var("ADMIN_EMAIL").ok(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_env();
        assert!(config.server.port > 0);
        assert_eq!(config.votes.window_days, 7);
        assert!(!config.session.secret.is_empty());
    }
}
