//! Filesystem-backed store.
//!
//! Each collection is one JSON document wrapped in a versioned envelope:
//!
//! ```json
//! { "version": 1, "identities": [ ... ] }
//! { "version": 1, "lastUsedIdentityId": "...", "lastUsedAt": "..." }
//! { "version": 1, "requests": [ ... ] }
//! ```
//!
//! Identity records are normalized on load, so hand-edited or imported files
//! with loose field shapes are accepted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroizing;

use crate::certification::ApprovalRequest;
use crate::error::{Result, SdidError};
use crate::identity::{normalize_identity, Identity, IdentityId};

use super::{ApprovalStore, IdentityStore};

// ── File format constants ─────────────────────────────────────────────────────

const STORE_FILE_VERSION: u32 = 1;

const IDENTITIES_FILE: &str = "identities.json";
const AGENT_FILE: &str = "agent.json";
const APPROVALS_FILE: &str = "approvals.json";

// ── On-disk structures ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct IdentitiesFile<T> {
    version: u32,
    identities: Vec<T>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentFile {
    version: u32,
    #[serde(default)]
    last_used_identity_id: Option<IdentityId>,
    #[serde(default)]
    last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApprovalsFile {
    version: u32,
    requests: Vec<ApprovalRequest>,
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// JSON-file implementation of both store traits.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new `FileStore` rooted at `base_dir`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns `SdidError::Io` if the directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Root directory of this store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }

    /// Read and parse a file, returning `None` when it does not exist.
    fn read_json<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Result<Option<T>> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(None);
        }
        // identities.json holds private keys
        let bytes = Zeroizing::new(std::fs::read(&path)?);
        let parsed = serde_json::from_slice(&bytes).map_err(|e| {
            SdidError::InvalidFileFormat(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(Some(parsed))
    }

    /// Serialize and write a file via a temporary sibling, then rename.
    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let json = Zeroizing::new(
            serde_json::to_string_pretty(value)
                .map_err(|e| SdidError::SerializationError(e.to_string()))?,
        );
        let path = self.path(file);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl IdentityStore for FileStore {
    fn load_identities(&self) -> Result<Vec<Identity>> {
        let Some(file) = self.read_json::<IdentitiesFile<Value>>(IDENTITIES_FILE)? else {
            return Ok(Vec::new());
        };
        Ok(file
            .identities
            .iter()
            .filter_map(normalize_identity)
            .collect())
    }

    fn save_identities(&self, identities: &[Identity]) -> Result<()> {
        self.write_json(
            IDENTITIES_FILE,
            &IdentitiesFile {
                version: STORE_FILE_VERSION,
                identities: identities.to_vec(),
            },
        )
    }

    fn last_used(&self) -> Result<Option<IdentityId>> {
        Ok(self
            .read_json::<AgentFile>(AGENT_FILE)?
            .and_then(|f| f.last_used_identity_id))
    }

    fn record_last_used(&self, id: &IdentityId) -> Result<()> {
        self.write_json(
            AGENT_FILE,
            &AgentFile {
                version: STORE_FILE_VERSION,
                last_used_identity_id: Some(id.clone()),
                last_used_at: Some(crate::time::now()),
            },
        )
    }
}

impl ApprovalStore for FileStore {
    fn load_requests(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self
            .read_json::<ApprovalsFile>(APPROVALS_FILE)?
            .map(|f| f.requests)
            .unwrap_or_default())
    }

    fn save_requests(&self, requests: &[ApprovalRequest]) -> Result<()> {
        self.write_json(
            APPROVALS_FILE,
            &ApprovalsFile {
                version: STORE_FILE_VERSION,
                requests: requests.to_vec(),
            },
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
