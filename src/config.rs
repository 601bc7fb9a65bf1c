use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub service_name: String,
}

/// Thresholds for the scheduler-driven stale keyword sweep.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Keywords at or below this lifetime search count are sweep candidates.
    pub max_search_count: u64,
    /// Only keywords idle for longer than this many days are removed.
    pub retention_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Config {
            service: ServiceConfig {
                http_port: env::var("HTTP_PORT")
                    .unwrap_or_else(|_| "8084".to_string())
                    .parse()
                    .expect("HTTP_PORT must be a valid u16"),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "discovery-service".to_string()),
            },
            cleanup: CleanupConfig {
                max_search_count: env::var("CLEANUP_MAX_SEARCH_COUNT")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CLEANUP_MAX_SEARCH_COUNT must be a valid u64"),
                retention_days: env::var("CLEANUP_RETENTION_DAYS")
                    .unwrap_or_else(|_| "90".to_string())
                    .parse()
                    .expect("CLEANUP_RETENTION_DAYS must be a valid i64"),
            },
        }
    }
}
