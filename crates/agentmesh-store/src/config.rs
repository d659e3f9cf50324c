//! Store configuration

use serde::{Deserialize, Serialize};

/// PostgreSQL store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_postgres_url")]
    pub postgres_url: String,
    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum pool connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Run embedded migrations on connect
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            postgres_url: default_postgres_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            run_migrations: true,
        }
    }
}

impl StoreConfig {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_connections: env_parse("PG_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            min_connections: env_parse("PG_MIN_CONNECTIONS").unwrap_or(defaults.min_connections),
            acquire_timeout_secs: env_parse("PG_ACQUIRE_TIMEOUT").unwrap_or(defaults.acquire_timeout_secs),
            ..defaults
        }
    }

    /// Connection URL with the password masked, for logging
    pub fn postgres_url_masked(&self) -> String {
        mask_url(&self.postgres_url)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn default_postgres_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgresql://localhost/agentmesh".to_string())
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn mask_url(url: &str) -> String {
    if let (Some(scheme_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) {
        let user_pass = &url[scheme_end + 3..at_pos];
        if let Some(colon_pos) = user_pass.find(':') {
            let scheme = &url[..scheme_end + 3];
            let user = &user_pass[..colon_pos];
            return format!("{}{}:***{}", scheme, user, &url[at_pos..]);
        }
    }
    url.to_string()
}
