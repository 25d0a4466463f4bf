//! Server configuration from environment.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// JSON reference-data snapshot read at startup and on reload.
    pub reference_path: String,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Interval for dropping NOTAMs whose window has ended.
    pub notam_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("TWR_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            reference_path: env::var("TWR_REFERENCE_PATH")
                .unwrap_or_else(|_| "data/reference.json".to_string()),
            database_path: env::var("TWR_DATABASE_PATH")
                .unwrap_or_else(|_| "data/twr.db".to_string()),
            database_max_connections: env::var("TWR_DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            notam_sweep_interval_secs: env::var("TWR_NOTAM_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        }
    }
}
