//! Driver configuration
//!
//! Holds the handful of knobs a connection needs before the first statement
//! runs. Parsing connection strings is left to the host application.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// MySQL 8 default `sql_mode`.
pub const DEFAULT_SQL_MODE: &str =
    "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION";

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Name of the database that always exists and is selected on open
    pub database: String,

    /// Storage file; `None` opens a private in-memory engine
    pub path: Option<PathBuf>,

    /// Initial session `sql_mode`
    pub sql_mode: String,

    /// How long the engine waits on a locked file before reporting busy
    pub busy_timeout_ms: u64,

    /// Version string reported by `VERSION()` and used for `/*!NNNNN */` gates
    pub server_version: String,

    /// Default character set for new tables
    pub default_charset: String,

    /// Default collation for new tables
    pub default_collation: String,

    /// Initial value of `foreign_key_checks`
    pub foreign_key_checks: bool,

    /// Compare catalog and native schema right after opening
    pub validate_schema_on_open: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            database: "app".to_string(),
            path: None,
            sql_mode: DEFAULT_SQL_MODE.to_string(),
            busy_timeout_ms: 5000,
            server_version: "8.0.38".to_string(),
            default_charset: "utf8mb4".to_string(),
            default_collation: "utf8mb4_0900_ai_ci".to_string(),
            foreign_key_checks: true,
            validate_schema_on_open: false,
        }
    }
}

impl DriverConfig {
    /// In-memory connection with the given database name.
    pub fn in_memory(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    /// File-backed connection.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_sql_mode(mut self, sql_mode: impl Into<String>) -> Self {
        self.sql_mode = sql_mode.into();
        self
    }

    /// Relaxed mode: no strictness flags at all.
    pub fn relaxed(self) -> Self {
        self.with_sql_mode("")
    }

    pub fn with_busy_timeout_ms(mut self, timeout: u64) -> Self {
        self.busy_timeout_ms = timeout;
        self
    }

    pub fn with_foreign_key_checks(mut self, enabled: bool) -> Self {
        self.foreign_key_checks = enabled;
        self
    }

    /// Server version as the five-digit number used by `/*!NNNNN */` comments.
    pub fn version_number(&self) -> u32 {
        let mut parts = self
            .server_version
            .split(|c: char| !c.is_ascii_digit())
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u32>().unwrap_or(0));
        let major = parts.next().unwrap_or(0);
        let minor = parts.next().unwrap_or(0);
        let patch = parts.next().unwrap_or(0);
        major * 10000 + minor * 100 + patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.database, "app");
        assert!(config.path.is_none());
        assert!(config.sql_mode.contains("STRICT_TRANS_TABLES"));
    }

    #[test]
    fn test_version_number() {
        let config = DriverConfig::default();
        assert_eq!(config.version_number(), 80038);

        let mut config = DriverConfig::default();
        config.server_version = "5.7.44-log".into();
        assert_eq!(config.version_number(), 50744);
    }

    #[test]
    fn test_builder() {
        let config = DriverConfig::in_memory("shop")
            .relaxed()
            .with_busy_timeout_ms(10)
            .with_foreign_key_checks(false);
        assert_eq!(config.database, "shop");
        assert_eq!(config.sql_mode, "");
        assert_eq!(config.busy_timeout_ms, 10);
        assert!(!config.foreign_key_checks);
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"database":"blog","path":null,"sql_mode":"","busy_timeout_ms":1,
            "server_version":"8.0.1","default_charset":"utf8mb4",
            "default_collation":"utf8mb4_unicode_ci","foreign_key_checks":true,
            "validate_schema_on_open":false}"#;
        let config: DriverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.database, "blog");
        assert_eq!(config.version_number(), 80001);
    }
}
