//! Gateway configuration
//!
//! Resolution order:
//! 1. Built-in defaults
//! 2. Optional JSON file
//! 3. `DEVGATE_*` environment variables (a `.env` file is honoured)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{
    self, DEFAULT_AMQP_PORT, DEFAULT_AUTHORIZATION_BASE_ADDRESS, ENV_PREFIX, LOG_PREFIX,
    SASL_PLAIN,
};
use crate::domain::TenancyMode;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value [{value}] for environment variable {name}")]
    Env { name: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How a link whose address cannot be parsed is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressRejection {
    /// Receiver links are closed with an `invalid-field` condition,
    /// sender links are closed without any condition
    #[default]
    Asymmetric,
    /// Both link directions are closed with an `invalid-field` condition
    Uniform,
}

/// Credential verification policy applied after a PLAIN response was decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialPolicy {
    /// Every structurally valid PLAIN response is accepted.
    /// Development and test setups only.
    AcceptAll,
    /// Username to hex-encoded SHA-256 password digest
    Static {
        #[serde(default)]
        users: HashMap<String, String>,
    },
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self::Static {
            users: HashMap::new(),
        }
    }
}

/// SASL negotiation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaslConfig {
    /// Declared mechanisms; only `PLAIN` is implemented and advertised
    pub mechanisms: Vec<String>,
    pub credentials: CredentialPolicy,
}

impl Default for SaslConfig {
    fn default() -> Self {
        Self {
            mechanisms: vec![SASL_PLAIN.to_string()],
            credentials: CredentialPolicy::default(),
        }
    }
}

/// Settings of the per-worker authorization exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Address prefix, the worker index is appended as `.<index>`
    pub base_address: String,
    /// Deadline for one check; an expired check counts as denial
    pub timeout_ms: u64,
    /// Capacity of each worker's request channel
    pub queue_capacity: usize,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_AUTHORIZATION_BASE_ADDRESS.to_string(),
            timeout_ms: 5_000,
            queue_capacity: 64,
        }
    }
}

impl AuthorizationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rotated log files; console only when unset
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: LOG_PREFIX.to_string(),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub bind_address: String,
    /// Port to listen on, 0 lets the OS pick one
    pub port: u16,
    /// Upper bound for worker instances, 0 means available parallelism
    pub max_instances: usize,
    /// Addresses omit the tenant segment
    pub single_tenant: bool,
    pub startup_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub address_rejection: AddressRejection,
    pub authorization: AuthorizationConfig,
    pub sasl: SaslConfig,
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_AMQP_PORT,
            max_instances: 0,
            single_tenant: false,
            startup_timeout_secs: 20,
            shutdown_timeout_secs: 20,
            address_rejection: AddressRejection::default(),
            authorization: AuthorizationConfig::default(),
            sasl: SaslConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from defaults, an optional JSON file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("[Config] Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `DEVGATE_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            let name = format!("{}{}", ENV_PREFIX, key);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, value)) = var("BIND_ADDRESS") {
            self.bind_address = value;
        }
        if let Some((name, value)) = var("PORT") {
            self.port = parse_env(&name, &value)?;
        }
        if let Some((name, value)) = var("MAX_INSTANCES") {
            self.max_instances = parse_env(&name, &value)?;
        }
        if let Some((name, value)) = var("SINGLE_TENANT") {
            self.single_tenant = parse_env(&name, &value)?;
        }
        if let Some((name, value)) = var("STARTUP_TIMEOUT") {
            self.startup_timeout_secs = parse_env(&name, &value)?;
        }
        if let Some((name, value)) = var("SHUTDOWN_TIMEOUT") {
            self.shutdown_timeout_secs = parse_env(&name, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address must not be empty".into()));
        }
        if self.sasl.mechanisms.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one SASL mechanism must be declared".into(),
            ));
        }
        if self.startup_timeout_secs == 0 || self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        if self.authorization.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "authorization.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.authorization.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "authorization.queue_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn tenancy_mode(&self) -> TenancyMode {
        TenancyMode::from_single_tenant(self.single_tenant)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Number of worker instances to deploy
    ///
    /// `max_instances` caps the count when it is set and lower than the
    /// available parallelism; otherwise one worker per available core.
    pub fn instance_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let count = instance_count_for(self.max_instances, available);
        debug!(
            "[Config] {} worker instance(s) (max_instances={}, available={})",
            count, self.max_instances, available
        );
        count
    }

    /// Container identifier announced by one worker
    pub fn container_id(&self, port: u16, worker_index: usize) -> String {
        constants::container_id(&self.bind_address, port, worker_index)
    }

    /// Address of one worker's authorization service
    pub fn authorization_address(&self, worker_index: usize) -> String {
        constants::authorization_address(&self.authorization.base_address, worker_index)
    }
}

fn instance_count_for(max_instances: usize, available: usize) -> usize {
    if max_instances > 0 && max_instances < available {
        max_instances
    } else {
        available
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}
