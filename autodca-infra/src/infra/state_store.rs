use crate::infra::contracts::SessionKeyGrant;
use crate::infra::job_registry::JobRegistrySnapshot;
use crate::infra::nonce_manager::NonceEntry;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported state schema version {0}")]
    UnsupportedVersion(u32),
}

/// Everything needed to rebuild the registries after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub schema_version: u32,
    pub saved_at: String,
    pub grants: Vec<SessionKeyGrant>,
    pub jobs: JobRegistrySnapshot,
    pub nonces: Vec<NonceEntry>,
}

impl EngineState {
    pub fn new(
        grants: Vec<SessionKeyGrant>,
        jobs: JobRegistrySnapshot,
        nonces: Vec<NonceEntry>,
    ) -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            grants,
            jobs,
            nonces,
        }
    }
}

/// Single-file JSON snapshot. Writes go to a sibling temp file first and are
/// renamed into place, so a crash mid-write leaves the previous snapshot.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StateStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<EngineState>, StateStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let state: EngineState = serde_json::from_str(&content)?;
        if state.schema_version != STATE_SCHEMA_VERSION {
            return Err(StateStoreError::UnsupportedVersion(state.schema_version));
        }
        Ok(Some(state))
    }

    pub fn save(&self, state: &EngineState) -> Result<(), StateStoreError> {
        let temp_path = self.path.with_extension("tmp");

        {
            let mut file = File::create(&temp_path)?;
            let json = serde_json::to_string_pretty(state)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
