use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

pub static SUPABASE_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("SUPABASE_URL")
        .ok()
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
});

pub static SUPABASE_SERVICE_KEY: Lazy<Option<String>> = Lazy::new(|| {
    env::var("SUPABASE_SERVICE_ROLE_KEY")
        .or_else(|_| env::var("SUPABASE_SERVICE_KEY"))
        .ok()
        .filter(|key| !key.trim().is_empty())
});

pub fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Limits applied by the import pipeline.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Data rows accepted per paste; larger pastes fail at tokenize.
    pub max_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { max_rows: 500 }
    }
}

impl ImportConfig {
    pub fn from_env() -> Self {
        Self {
            max_rows: env_usize("IMPORT_MAX_ROWS", Self::default().max_rows),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl HttpConfig {
    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS", 15)),
            connect_timeout: Duration::from_secs(env_u64("HTTP_CONNECT_TIMEOUT_SECS", 5)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub queue_capacity: usize,
    pub request_max_bytes: usize,
    pub idempotency_ttl_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.trim().parse::<u16>().ok())
                .unwrap_or(8000),
            queue_capacity: env_usize("QUEUE_CAPACITY", 64),
            request_max_bytes: env_usize("REQUEST_MAX_BYTES", 1024 * 1024),
            idempotency_ttl_secs: env_u64("IDEMPOTENCY_TTL_SECS", 3600),
        }
    }
}
