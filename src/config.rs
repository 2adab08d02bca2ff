// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. Invalid values
//! fail startup with a [`ConfigError`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory of the persisted session store | `./data` |
//! | `HOST` | Server bind address | `127.0.0.1` |
//! | `PORT` | Server bind port | `8080` |
//! | `RELAY_URL` | Relay endpoint embedded in connection URIs | `http://127.0.0.1:5001` |
//! | `CLIENT_NAME` | Name announced to the remote signer | `Location Recovery` |
//! | `CHAIN_ID` | Chain id requested in the session handshake | unset |
//! | `CALL_TIMEOUT_SECS` | Timeout of each call sent to the signer | `120` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::session::{EngineSettings, PeerMeta};

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const RELAY_URL_ENV: &str = "RELAY_URL";
pub const CLIENT_NAME_ENV: &str = "CLIENT_NAME";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const CALL_TIMEOUT_ENV: &str = "CALL_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_CLIENT_NAME: &str = "Location Recovery";
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the session store inside `DATA_DIR`.
pub const SESSION_DB_FILE: &str = "sessions.redb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub relay_url: Url,
    pub client_name: String,
    pub chain_id: Option<u64>,
    pub call_timeout: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let data_dir = PathBuf::from(var(DATA_DIR_ENV).unwrap_or_else(|| "./data".to_string()));

        let host = var(HOST_ENV).unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match var(PORT_ENV) {
            Some(value) => parse(PORT_ENV, &value)?,
            None => 8080u16,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(HOST_ENV, &host, e))?;

        let relay = var(RELAY_URL_ENV).unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        let relay_url = Url::parse(&relay).map_err(|e| invalid(RELAY_URL_ENV, &relay, e))?;
        if !matches!(relay_url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(invalid(RELAY_URL_ENV, &relay, "expected an http(s) or ws(s) URL"));
        }

        let chain_id = var(CHAIN_ID_ENV)
            .map(|value| parse(CHAIN_ID_ENV, &value))
            .transpose()?;

        let timeout_secs = match var(CALL_TIMEOUT_ENV) {
            Some(value) => parse(CALL_TIMEOUT_ENV, &value)?,
            None => DEFAULT_CALL_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(invalid(CALL_TIMEOUT_ENV, "0", "must be positive"));
        }

        let log_format = match var(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(format) if format == "pretty" => LogFormat::Pretty,
            Some(format) if format == "json" => LogFormat::Json,
            Some(other) => return Err(invalid(LOG_FORMAT_ENV, &other, "expected `json` or `pretty`")),
        };

        Ok(Self {
            data_dir,
            bind_addr,
            relay_url,
            client_name: var(CLIENT_NAME_ENV).unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string()),
            chain_id,
            call_timeout: Duration::from_secs(timeout_secs),
            log_format,
        })
    }

    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_DB_FILE)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            relay_endpoint: self.relay_url.clone(),
            client_meta: PeerMeta {
                name: self.client_name.clone(),
                description: Some("Recovers Safe ownership from secret locations".to_string()),
                url: None,
                icons: Vec::new(),
            },
            chain_id: self.chain_id,
            call_timeout: self.call_timeout,
        }
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| invalid(name, value, e))
}

fn invalid(name: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.relay_url.as_str(), "http://127.0.0.1:5001/");
        assert_eq!(config.client_name, DEFAULT_CLIENT_NAME);
        assert_eq!(config.chain_id, None);
        assert_eq!(config.call_timeout, Duration::from_secs(120));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.session_db_path(), PathBuf::from("./data/sessions.redb"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("DATA_DIR", "/var/lib/recovery"),
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("RELAY_URL", "https://bridge.example.org"),
            ("CHAIN_ID", "4"),
            ("CALL_TIMEOUT_SECS", "30"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.chain_id, Some(4));
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Json);

        let settings = config.engine_settings();
        assert_eq!(settings.relay_endpoint.as_str(), "https://bridge.example.org/");
        assert_eq!(settings.chain_id, Some(4));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("RELAY_URL", "ftp://relay")]).is_err());
        assert!(load(&[("CALL_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());

        match load(&[("CHAIN_ID", "rinkeby")]) {
            Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, CHAIN_ID_ENV),
            other => panic!("expected invalid CHAIN_ID, got {other:?}"),
        }
    }
}
