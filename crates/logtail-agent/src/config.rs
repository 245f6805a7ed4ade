// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration.
//!
//! Sources are applied in the following order (later sources override
//! earlier): hard-coded defaults, the YAML file (`logtail.yaml`, path
//! overridable via `LOGTAIL_CONFIG_PATH`), then `LOGTAIL_*` environment
//! variables. Everything is loaded once at startup and immutable for the
//! process lifetime.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;
use thiserror::Error;

use logtail_core::Identity;
use logtail_sources::SourceDecl;
use logtail_transport::TransportConfig;

const CONFIG_PATH_VAR: &str = "LOGTAIL_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "logtail.yaml";
const ENV_PREFIX: &str = "LOGTAIL_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Drops the diagnostic floor from info to debug.
    #[serde(default)]
    pub verbose: bool,

    /// How often the dispatcher drains the queue.
    #[serde(default = "default_dispatch_interval_ms")]
    pub dispatch_interval_ms: u64,

    /// Hard bound on buffered entries; overflow evicts the oldest.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Fixed delay between transport connect attempts.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    pub remote_address: String,
    pub remote_port: u16,

    /// Trust-anchor PEM presented collector certificates must chain to.
    pub ca_cert_path: PathBuf,

    pub identity: String,
    pub identity_secret: String,

    /// Receive limit for a single reply frame.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,

    /// Declarative table of source backends to start.
    #[serde(default)]
    pub sources: Vec<SourceDecl>,
}

fn default_dispatch_interval_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    50_000
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_max_frame_len() -> usize {
    1024 * 1024
}

impl Config {
    /// Loads and validates the configuration from the default file path
    /// and the environment.
    pub fn load() -> Result<Config, ConfigError> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_figment(Figment::new().merge(Yaml::file(path)))
    }

    fn from_figment(figment: Figment) -> Result<Config, ConfigError> {
        let config: Config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "dispatch_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.remote_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "remote_address must not be empty".to_string(),
            ));
        }
        if self.remote_port == 0 {
            return Err(ConfigError::Invalid(
                "remote_port must not be 0".to_string(),
            ));
        }
        if self.identity.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "identity must not be empty".to_string(),
            ));
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    /// The transport's immutable view of this configuration.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            remote_address: self.remote_address.clone(),
            remote_port: self.remote_port,
            ca_cert_path: self.ca_cert_path.clone(),
            identity: Identity::new(&self.identity, &self.identity_secret),
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
            max_frame_len: self.max_frame_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const MINIMAL_YAML: &str = r#"
remote_address: collector.example.com
remote_port: 6514
ca_cert_path: /etc/logtail/collector.pem
identity: edge-42
identity_secret: hunter2
"#;

    fn from_yaml(yaml: &str) -> Result<Config, ConfigError> {
        Config::from_figment(Figment::new().merge(Yaml::string(yaml)))
    }

    #[test]
    #[serial]
    fn minimal_yaml_gets_the_defaults() {
        let config = from_yaml(MINIMAL_YAML).unwrap();
        assert!(!config.verbose);
        assert_eq!(config.dispatch_interval_ms, 2000);
        assert_eq!(config.queue_capacity, 50_000);
        assert_eq!(config.reconnect_delay_secs, 10);
        assert_eq!(config.max_frame_len, 1024 * 1024);
        assert!(config.sources.is_empty());
        assert_eq!(config.remote_address, "collector.example.com");
        assert_eq!(config.remote_port, 6514);
    }

    #[test]
    #[serial]
    fn yaml_overrides_and_sources_parse() {
        let yaml = r#"
verbose: true
dispatch_interval_ms: 250
queue_capacity: 128
remote_address: collector.example.com
remote_port: 6514
ca_cert_path: /etc/logtail/collector.pem
identity: edge-42
identity_secret: hunter2
sources:
  - type: journal
    identifier: host-journal
  - type: file
    identifier: app
    path: /var/log/app.log
"#;
        let config = from_yaml(yaml).unwrap();
        assert!(config.verbose);
        assert_eq!(config.dispatch_interval_ms, 250);
        assert_eq!(config.queue_capacity, 128);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, "journal");
        assert_eq!(config.sources[1].path.as_deref(), Some(std::path::Path::new("/var/log/app.log")));
    }

    #[test]
    #[serial]
    fn env_overrides_the_file() {
        env::set_var("LOGTAIL_REMOTE_PORT", "7000");
        env::set_var("LOGTAIL_VERBOSE", "true");
        let config = from_yaml(MINIMAL_YAML).unwrap();
        env::remove_var("LOGTAIL_REMOTE_PORT");
        env::remove_var("LOGTAIL_VERBOSE");

        assert_eq!(config.remote_port, 7000);
        assert!(config.verbose);
    }

    #[test]
    #[serial]
    fn missing_required_keys_fail_to_load() {
        let result = from_yaml("verbose: true\n");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    #[serial]
    fn zero_intervals_are_rejected() {
        let yaml = format!("{MINIMAL_YAML}dispatch_interval_ms: 0\n");
        assert!(matches!(from_yaml(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn empty_identity_is_rejected() {
        let yaml = MINIMAL_YAML.replace("identity: edge-42", "identity: \"  \"");
        assert!(matches!(from_yaml(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn config_path_env_var_points_at_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logtail.yaml");
        std::fs::write(&path, MINIMAL_YAML).unwrap();

        env::set_var(CONFIG_PATH_VAR, &path);
        let config = Config::load();
        env::remove_var(CONFIG_PATH_VAR);

        let config = config.unwrap();
        assert_eq!(config.remote_address, "collector.example.com");
        assert_eq!(config.identity, "edge-42");
    }

    #[test]
    #[serial]
    fn transport_config_carries_the_identity() {
        let config = from_yaml(MINIMAL_YAML).unwrap();
        let transport = config.transport_config();
        assert_eq!(transport.identity.name(), "edge-42");
        assert_eq!(transport.identity.secret(), "hunter2");
        assert_eq!(transport.reconnect_delay, Duration::from_secs(10));
    }
}
