use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CrmError, Result};

/// Runtime configuration, read from the environment (and `.env`).
///
/// | Env Var             | Default         |
/// |---------------------|-----------------|
/// | `CRM_DATA_DIR`      | `crm_data`      |
/// | `CRM_REST_ADDR`     | `0.0.0.0:11111` |
/// | `CRM_SEED_FIXTURES` | `true`          |
/// | `CRM_LOG_DIR`       | unset           |
/// | `CRM_LOG_JSON`      | `false`         |
/// | `CRM_REPORT_DIR`    | `.`             |
#[derive(Debug, Clone, PartialEq)]
pub struct CrmConfig {
    pub data_dir: PathBuf,
    pub rest_addr: SocketAddr,
    pub seed_fixtures: bool,
    /// Daily-rolling log files go here when set.
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,
    pub report_dir: PathBuf,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("crm_data"),
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 11111)),
            seed_fixtures: true,
            log_dir: None,
            log_json: false,
            report_dir: PathBuf::from("."),
        }
    }
}

impl CrmConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or blank variables keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            data_dir: var("CRM_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            rest_addr: match var("CRM_REST_ADDR") {
                Some(raw) => parse("CRM_REST_ADDR", &raw)?,
                None => defaults.rest_addr,
            },
            seed_fixtures: match var("CRM_SEED_FIXTURES") {
                Some(raw) => parse_flag("CRM_SEED_FIXTURES", &raw)?,
                None => defaults.seed_fixtures,
            },
            log_dir: var("CRM_LOG_DIR").map(PathBuf::from),
            log_json: match var("CRM_LOG_JSON") {
                Some(raw) => parse_flag("CRM_LOG_JSON", &raw)?,
                None => defaults.log_json,
            },
            report_dir: var("CRM_REPORT_DIR").map(PathBuf::from).unwrap_or(defaults.report_dir),
        })
    }
}

fn parse<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| CrmError::Config(format!("{name}={raw:?} is invalid: {e}")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CrmError::Config(format!("{name}={raw:?} is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<CrmConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CrmConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, CrmConfig::default());
        assert_eq!(cfg.rest_addr.port(), 11111);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("CRM_DATA_DIR", "/var/lib/crm"),
            ("CRM_REST_ADDR", "127.0.0.1:8080"),
            ("CRM_SEED_FIXTURES", "no"),
            ("CRM_LOG_DIR", "logs"),
            ("CRM_LOG_JSON", "TRUE"),
            ("CRM_REPORT_DIR", "  "),
        ])
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/crm"));
        assert_eq!(cfg.rest_addr.port(), 8080);
        assert!(!cfg.seed_fixtures);
        assert_eq!(cfg.log_dir, Some(PathBuf::from("logs")));
        assert!(cfg.log_json);
        assert_eq!(cfg.report_dir, PathBuf::from("."));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            config(&[("CRM_REST_ADDR", "not-an-addr")]),
            Err(CrmError::Config(_))
        ));
        assert!(matches!(
            config(&[("CRM_LOG_JSON", "maybe")]),
            Err(CrmError::Config(_))
        ));
    }
}
