use std::env;
use std::path::PathBuf;

/// Default retention window for a transfer.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Runtime configuration for the transfer backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory for stored transfer content (default: ./uploads)
    pub storage_dir: PathBuf,

    /// Days a transfer stays downloadable (default: 7)
    pub retention_days: i64,

    /// Seconds between retention sweeps (default: 3600)
    pub sweep_interval_secs: u64,

    /// Optional request body limit in bytes; unset means unbounded
    pub max_file_size: Option<usize>,

    /// Listen address (default: 127.0.0.1:3000)
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./uploads"),
            retention_days: DEFAULT_RETENTION_DAYS,
            sweep_interval_secs: 3600,
            max_file_size: None,
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.storage_dir),

            retention_days: env::var("RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|d| *d > 0)
                .unwrap_or(default.retention_days),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(default.sweep_interval_secs),

            max_file_size: env::var("MAX_FILE_SIZE").ok().and_then(|v| v.parse().ok()),

            bind_addr: env::var("BIND_ADDR").unwrap_or(default.bind_addr),
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.sweep_interval_secs, 3600);
        assert_eq!(config.max_file_size, None);
        assert_eq!(config.storage_dir, PathBuf::from("./uploads"));
    }

    #[test]
    fn test_retention_duration() {
        let config = AppConfig::default();
        assert_eq!(config.retention(), chrono::Duration::days(7));
        assert_eq!(config.sweep_interval().as_secs(), 3600);
    }
}
