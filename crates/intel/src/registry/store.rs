//! Sealed target registry.
//!
//! The registry is a small comma-delimited table with a detached
//! integrity envelope. Every mutation happens under the exclusive lock
//! and ends with a reseal, so on-disk content and envelope never diverge
//! across a successful operation boundary. Divergence is classified as
//! corruption and is only ever repaired by full reinitialization.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::lock::{FileLock, LockService};
use crate::registry::session::SessionState;

pub const SCHEMA_HEADERS: [&str; 11] = [
    "Target_ID",
    "Target_Name",
    "Input_Value",
    "Scope_Status",
    "Resolved_IP",
    "OS_Tech",
    "Open_Ports",
    "Services",
    "Auth_Method",
    "Notes",
    "VMS_Score",
];

pub const SCHEMA_VERSION: &str = "1.0";

const UNSET: &str = "TBD";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry lock held by live process {pid}")]
    LockHeld { pid: i32 },

    #[error("registry I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry row encoding failure: {0}")]
    Csv(#[from] csv::Error),

    #[error("integrity envelope encoding failure: {0}")]
    Envelope(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeStatus {
    Pending,
    Scanned,
    Scored,
}

impl fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Scanned => write!(f, "SCANNED"),
            Self::Scored => write!(f, "SCORED"),
        }
    }
}

/// One registry row. Field order matches [`SCHEMA_HEADERS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    #[serde(rename = "Target_ID")]
    pub id: String,
    #[serde(rename = "Target_Name")]
    pub name: String,
    #[serde(rename = "Input_Value")]
    pub input_value: String,
    #[serde(rename = "Scope_Status")]
    pub scope_status: ScopeStatus,
    #[serde(rename = "Resolved_IP")]
    pub resolved_ip: String,
    #[serde(rename = "OS_Tech")]
    pub os_tech: String,
    #[serde(rename = "Open_Ports")]
    pub open_ports: String,
    #[serde(rename = "Services")]
    pub services: String,
    #[serde(rename = "Auth_Method")]
    pub auth_method: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    #[serde(rename = "VMS_Score")]
    pub score: String,
}

/// A target as submitted by the operator, before the store assigns an
/// identifier and scope status.
#[derive(Debug, Clone)]
pub struct NewTarget {
    pub name: String,
    pub input_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityEnvelope {
    pub sha256: String,
    pub size: u64,
    pub schema_hash: String,
    pub schema_version: String,
    pub tool_version: String,
    pub sealed_at: String,
}

pub struct SessionStore {
    csv_path: PathBuf,
    hash_path: PathBuf,
    meta_path: PathBuf,
    lock: Box<dyn LockService>,
}

impl SessionStore {
    /// Canonical on-disk layout under a base directory: the registry in
    /// `output/`, envelope and lock marker in `.runtime_integrity/`.
    pub fn open(base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        let integrity_dir = base.join(".runtime_integrity");
        Self::with_paths(
            base.join("output").join("vantage_targets.csv"),
            &integrity_dir,
            Box::new(FileLock::new(integrity_dir.join(".lock"))),
        )
    }

    pub fn with_paths(
        csv_path: impl Into<PathBuf>,
        integrity_dir: &Path,
        lock: Box<dyn LockService>,
    ) -> Self {
        Self {
            csv_path: csv_path.into(),
            hash_path: integrity_dir.join("integrity.sha256"),
            meta_path: integrity_dir.join("session.meta.json"),
            lock,
        }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn lock(&self) -> &dyn LockService {
        self.lock.as_ref()
    }

    pub(crate) fn with_exclusive<T>(
        &self,
        op: impl FnOnce() -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        self.lock.try_acquire()?;
        let outcome = op();
        let released = self.lock.release();
        match (outcome, released) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    fn schema_hash() -> String {
        hex::encode(Sha256::digest(SCHEMA_HEADERS.join(",").as_bytes()))
    }

    fn content_hash(&self) -> Result<String, RegistryError> {
        let bytes = fs::read(&self.csv_path)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Classifies the registry without mutating anything. A missing
    /// envelope, an unreadable envelope, a content-hash mismatch, and a
    /// schema-hash mismatch are all corruption; schema evolution is not
    /// migrated, it is reinitialized.
    pub fn inspect_state(&self) -> SessionState {
        if !self.csv_path.exists() {
            return SessionState::New;
        }
        if !self.hash_path.exists() || !self.meta_path.exists() {
            return SessionState::Corrupted;
        }

        let envelope: IntegrityEnvelope = match fs::read_to_string(&self.meta_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
        {
            Some(envelope) => envelope,
            None => return SessionState::Corrupted,
        };

        let current = match self.content_hash() {
            Ok(hash) => hash,
            Err(_) => return SessionState::Corrupted,
        };

        if current != envelope.sha256 || envelope.schema_hash != Self::schema_hash() {
            return SessionState::Corrupted;
        }

        SessionState::Healthy
    }

    /// Recomputes and persists the integrity envelope over the current
    /// on-disk content. No-op when the registry file does not exist yet.
    pub fn seal(&self) -> Result<(), RegistryError> {
        if !self.csv_path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.meta_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let sha256 = self.content_hash()?;
        let envelope = IntegrityEnvelope {
            sha256: sha256.clone(),
            size: fs::metadata(&self.csv_path)?.len(),
            schema_hash: Self::schema_hash(),
            schema_version: SCHEMA_VERSION.to_string(),
            tool_version: crate::TOOL_VERSION.to_string(),
            sealed_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        };

        fs::write(&self.hash_path, &sha256)?;
        fs::write(&self.meta_path, serde_json::to_string_pretty(&envelope)?)?;
        debug!(hash = %sha256, "registry sealed");
        Ok(())
    }

    /// Creates an empty registry with the canonical schema and seals it.
    /// Destructive by intent: any prior content is discarded.
    pub fn initialize_new(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.csv_path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write_rows(&[])?;
        self.seal()
    }

    pub fn load_targets(&self) -> Result<Vec<TargetRecord>, RegistryError> {
        self.read_rows()
    }

    /// Appends new targets with sequential identifiers continuing from
    /// the current row count, all under exclusive access. Returns without
    /// touching the lock when `entries` is empty.
    pub fn append_targets(&self, entries: &[NewTarget]) -> Result<usize, RegistryError> {
        if entries.is_empty() {
            return Ok(0);
        }

        self.with_exclusive(|| {
            let mut rows = self.read_rows()?;
            let start_id = rows.len() + 1;

            for (offset, target) in entries.iter().enumerate() {
                rows.push(TargetRecord {
                    id: format!("TR-{:03}", start_id + offset),
                    name: target.name.clone(),
                    input_value: target.input_value.clone(),
                    scope_status: ScopeStatus::Pending,
                    resolved_ip: UNSET.to_string(),
                    os_tech: UNSET.to_string(),
                    open_ports: UNSET.to_string(),
                    services: UNSET.to_string(),
                    auth_method: UNSET.to_string(),
                    notes: UNSET.to_string(),
                    score: UNSET.to_string(),
                });
            }

            self.write_rows(&rows)?;
            self.seal()?;
            Ok(entries.len())
        })
    }

    /// Writes a computed score into the most recently appended row and
    /// marks it SCORED, resealing afterwards.
    pub fn record_score(&self, score: u8) -> Result<(), RegistryError> {
        self.with_exclusive(|| {
            let mut rows = self.read_rows()?;
            match rows.last_mut() {
                Some(row) => {
                    row.score = score.to_string();
                    row.scope_status = ScopeStatus::Scored;
                }
                None => {
                    warn!("no registry rows to score");
                    return Ok(());
                }
            }
            self.write_rows(&rows)?;
            self.seal()
        })
    }

    fn read_rows(&self) -> Result<Vec<TargetRecord>, RegistryError> {
        if !self.csv_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.csv_path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn write_rows(&self, rows: &[TargetRecord]) -> Result<(), RegistryError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.csv_path)?;
        writer.write_record(SCHEMA_HEADERS)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
