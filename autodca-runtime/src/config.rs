//! Engine configuration loader.

use crate::interfaces::EngineError;
use crate::types::EXECUTE_JOB_SIGNATURE;
use autodca::infra::contracts::{Address, Selector};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Only calls to this target are routed to the job executor.
    pub executor_address: Address,
    #[serde(default = "default_execute_signature")]
    pub execute_signature: String,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_ops")]
    pub max_concurrent_ops: usize,
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_execute_signature() -> String {
    EXECUTE_JOB_SIGNATURE.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_max_concurrent_ops() -> usize {
    64
}

impl EngineConfig {
    /// Defaults for everything but the executor address.
    pub fn new(executor_address: Address) -> Self {
        Self {
            executor_address,
            execute_signature: default_execute_signature(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_concurrent_ops: default_max_concurrent_ops(),
            audit_log: None,
            state_file: None,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.executor_address.is_empty() {
            return Err(EngineError::ConfigError(
                "Config missing required field: executor_address".to_string(),
            ));
        }
        if self.execute_signature.trim().is_empty() {
            return Err(EngineError::ConfigError(
                "execute_signature must be non-empty".to_string(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(EngineError::ConfigError(
                "lock_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_ops == 0 {
            return Err(EngineError::ConfigError(
                "max_concurrent_ops must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn execute_selector(&self) -> Selector {
        Selector::from_signature(self.execute_signature.trim())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Load engine configuration from a YAML file.
///
/// Relative `audit_log` and `state_file` paths resolve against the config
/// file's directory.
///
/// # Errors
/// Returns error if the file is missing, empty, not valid YAML, or fails validation
pub fn load_engine_config(config_path: &str) -> Result<EngineConfig, EngineError> {
    let config_file = Path::new(config_path);

    if !config_file.exists() {
        return Err(EngineError::ConfigError(format!(
            "Config file not found: {}",
            config_path
        )));
    }

    let content = std::fs::read_to_string(config_file)?;

    if content.trim().is_empty() {
        return Err(EngineError::ConfigError("Config file is empty".to_string()));
    }

    let mut config: EngineConfig = serde_yaml::from_str(&content)
        .map_err(|e| EngineError::ConfigError(format!("Invalid YAML: {}", e)))?;

    config.validate()?;

    let base = config_file.parent().unwrap_or_else(|| Path::new("."));
    config.audit_log = config.audit_log.map(|p| resolve_relative(base, p));
    config.state_file = config.state_file.map(|p| resolve_relative(base, p));

    Ok(config)
}

fn resolve_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
