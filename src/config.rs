//! Environment configuration, loaded once at startup. Plain
//! `std::env::var(...).unwrap_or_else(...)` reads rather than pulling in a config crate — the
//! surface here is a handful of variables.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub store_url: Option<String>,
    pub session_cookie_name: String,
    pub session_signing_key: String,
    pub max_rooms: usize,
    pub room_idle_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            store_url: std::env::var("STORE_URL").ok(),
            session_cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "session".to_string()),
            session_signing_key: std::env::var("SESSION_SIGNING_KEY").unwrap_or_default(),
            max_rooms: std::env::var("MAX_ROOMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            room_idle_ttl: std::env::var("ROOM_IDLE_TTL")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(3600)),
        }
    }
}
