//! Environment configuration shared by the CLI and the API service

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Upsert straight into the `weekly_reports` table
    Postgres,
    /// Post batches to a reporting backend
    Http,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: Option<String>,
    pub db_max_connections: u32,
    pub sink_kind: SinkKind,
    pub sink_url: String,
    pub api_bind: String,
    pub derive_syllabus_pace: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sink_kind = match lookup("SINK_KIND").as_deref().map(str::trim) {
            None | Some("") | Some("pg") | Some("postgres") => SinkKind::Postgres,
            Some("http") => SinkKind::Http,
            Some(other) => bail!("SINK_KIND must be 'pg' or 'http', got '{}'", other),
        };

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid DB_MAX_CONNECTIONS '{}'", v))?,
            None => 5,
        };

        let derive_syllabus_pace = match lookup("DERIVE_SYLLABUS_PACE") {
            Some(v) => parse_flag(&v)
                .with_context(|| format!("Invalid DERIVE_SYLLABUS_PACE '{}'", v))?,
            None => false,
        };

        Ok(Self {
            db_url: lookup("DB_URL").filter(|v| !v.trim().is_empty()),
            db_max_connections,
            sink_kind,
            sink_url: lookup("SINK_URL").unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
            api_bind: lookup("API_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            derive_syllabus_pace,
        })
    }

    pub fn require_db_url(&self) -> Result<&str> {
        self.db_url.as_deref().context("DB_URL env var missing")
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.db_url, None);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.sink_kind, SinkKind::Postgres);
        assert_eq!(config.sink_url, "http://127.0.0.1:8080");
        assert_eq!(config.api_bind, "127.0.0.1:8080");
        assert!(!config.derive_syllabus_pace);
        assert!(config.require_db_url().is_err());
    }

    #[test]
    fn test_explicit_values() {
        let config = config(&[
            ("DB_URL", "postgres://localhost/reports"),
            ("DB_MAX_CONNECTIONS", "10"),
            ("SINK_KIND", "http"),
            ("SINK_URL", "http://backend:3001"),
            ("API_BIND", "0.0.0.0:9000"),
            ("DERIVE_SYLLABUS_PACE", "Yes"),
        ])
        .unwrap();
        assert_eq!(config.require_db_url().unwrap(), "postgres://localhost/reports");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.sink_kind, SinkKind::Http);
        assert_eq!(config.sink_url, "http://backend:3001");
        assert_eq!(config.api_bind, "0.0.0.0:9000");
        assert!(config.derive_syllabus_pace);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("SINK_KIND", "kafka")]).is_err());
        assert!(config(&[("DB_MAX_CONNECTIONS", "many")]).is_err());
        assert!(config(&[("DERIVE_SYLLABUS_PACE", "maybe")]).is_err());
    }

    #[test]
    fn test_blank_db_url_is_missing() {
        let config = config(&[("DB_URL", "  ")]).unwrap();
        assert!(config.db_url.is_none());
    }
}
