use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the watchpost dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP bind configuration
    pub server: ServerConfig,
    /// Side files consulted on every request
    pub paths: PathsConfig,
    /// Lookback windows for log queries
    pub windows: WindowConfig,
    /// External command configuration
    pub commands: CommandConfig,
    /// Login session listing configuration
    pub sessions: SessionConfig,
}

/// HTTP bind configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Paths to the trust list and the offline geo database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON file of the form `{"ips": ["1.2.3.4", ...]}`
    pub trusted_ips: PathBuf,
    /// MaxMind GeoLite2-City database
    pub geoip_db: PathBuf,
}

/// Lookback windows in hours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window for historical events (attacks, logins, access logs)
    pub history_hours: u32,
    /// Window for "currently active" users
    pub active_hours: u32,
}

/// External command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Per-invocation timeout in seconds
    pub timeout_secs: u64,
    /// How long a command result is reused, in seconds (0 disables caching)
    pub cache_ttl_secs: u64,
    /// Name of the OpenProject application container
    pub app_container: String,
    /// Name of the OpenProject database container
    pub db_container: String,
}

/// How the `w` and `who` listings are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMergePolicy {
    /// One entry per (user, terminal, ip) across both listings
    Merge,
    /// Entries from both listings are kept side by side
    Duplicate,
}

/// Login session listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub merge_policy: SessionMergePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            paths: PathsConfig {
                trusted_ips: PathBuf::from("/opt/ssh-monitor/trusted_ips.json"),
                geoip_db: PathBuf::from("/opt/ssh-monitor/GeoLite2-City.mmdb"),
            },
            windows: WindowConfig {
                history_hours: 24,
                active_hours: 1,
            },
            commands: CommandConfig {
                timeout_secs: 30,
                cache_ttl_secs: 5,
                app_container: "openproject".to_string(),
                db_container: "op_db".to_string(),
            },
            sessions: SessionConfig {
                merge_policy: SessionMergePolicy::Merge,
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `HOST` / `PORT` environment overrides to the bind address
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => log::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_windows() {
        let config = Config::default();
        assert_eq!(config.windows.history_hours, 24);
        assert_eq!(config.windows.active_hours, 1);
        assert_eq!(config.commands.timeout_secs, 30);
        assert_eq!(config.sessions.merge_policy, SessionMergePolicy::Merge);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watchpost.toml");

        let mut config = Config::default();
        config.server.port = 9090;
        config.sessions.merge_policy = SessionMergePolicy::Duplicate;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 9090);
        assert_eq!(loaded.sessions.merge_policy, SessionMergePolicy::Duplicate);
        assert_eq!(loaded.commands.db_container, "op_db");
    }

    #[test]
    fn test_merge_policy_snake_case() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 8091

            [paths]
            trusted_ips = "trusted.json"
            geoip_db = "geo.mmdb"

            [windows]
            history_hours = 12
            active_hours = 2

            [commands]
            timeout_secs = 10
            cache_ttl_secs = 0
            app_container = "op"
            db_container = "db"

            [sessions]
            merge_policy = "duplicate"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sessions.merge_policy, SessionMergePolicy::Duplicate);
        assert_eq!(config.windows.history_hours, 12);
        assert_eq!(config.commands.cache_ttl_secs, 0);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = Config::from_file(&PathBuf::from("/nonexistent/watchpost.toml"));
        assert!(result.is_err());
    }
}
