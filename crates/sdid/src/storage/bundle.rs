//! Identity export, import and removal.
//!
//! An export is a versioned bundle holding every stored identity with both
//! its public and private JWK:
//!
//! ```json
//! { "version": 1, "exportedAt": "...", "identities": [ ... ] }
//! ```
//!
//! Import also accepts a bare array of records. Every record goes through
//! [`normalize_identity`], so loosely shaped files load the same way a
//! hand-edited `identities.json` does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SdidError};
use crate::identity::{normalize_identity, Identity, IdentityId};

use super::IdentityStore;

/// Current bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

/// Exported identities. Contains private keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityBundle {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub identities: Vec<Identity>,
}

/// What an import changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records added under a new id.
    pub added: usize,
    /// Records that replaced a stored identity with the same id.
    pub replaced: usize,
    /// Entries that were not identity objects.
    pub skipped: usize,
}

/// Bundle every stored identity.
pub fn export_identities<S: IdentityStore + ?Sized>(store: &S) -> Result<IdentityBundle> {
    Ok(IdentityBundle {
        version: BUNDLE_VERSION,
        exported_at: crate::time::now(),
        identities: store.load_identities()?,
    })
}

/// Merge a bundle (or bare record array) into the store.
///
/// Records are keyed by id: an imported record replaces a stored one with
/// the same id, and within one file the last record for an id wins.
pub fn import_identities<S: IdentityStore + ?Sized>(store: &S, raw: &Value) -> Result<ImportSummary> {
    let records = match raw {
        Value::Array(records) => records,
        Value::Object(obj) => {
            let version = obj.get("version").and_then(Value::as_u64).unwrap_or(0);
            if version != u64::from(BUNDLE_VERSION) {
                return Err(SdidError::InvalidFileFormat(format!(
                    "unsupported identity bundle version {version}"
                )));
            }
            obj.get("identities")
                .and_then(Value::as_array)
                .ok_or_else(|| SdidError::InvalidFileFormat("bundle has no identities".into()))?
        }
        _ => {
            return Err(SdidError::InvalidFileFormat(
                "expected an identity bundle or an array of identities".into(),
            ))
        }
    };

    let mut identities = store.load_identities()?;
    let mut summary = ImportSummary::default();
    for record in records {
        let Some(identity) = normalize_identity(record) else {
            summary.skipped += 1;
            continue;
        };
        match identities.iter_mut().find(|i| i.id == identity.id) {
            Some(existing) => {
                *existing = identity;
                summary.replaced += 1;
            }
            None => {
                identities.push(identity);
                summary.added += 1;
            }
        }
    }
    store.save_identities(&identities)?;
    log::info!(
        "imported identities: {} added, {} replaced, {} skipped",
        summary.added,
        summary.replaced,
        summary.skipped
    );
    Ok(summary)
}

/// Remove one identity. Returns the removed record, or `None` if absent
/// (in which case nothing is written).
pub fn delete_identity<S: IdentityStore + ?Sized>(store: &S, id: &IdentityId) -> Result<Option<Identity>> {
    let mut identities = store.load_identities()?;
    let Some(index) = identities.iter().position(|i| &i.id == id) else {
        return Ok(None);
    };
    let removed = identities.remove(index);
    store.save_identities(&identities)?;
    log::info!("deleted identity {}", removed.id);
    Ok(Some(removed))
}

/// Remove every identity. Returns how many were removed.
pub fn clear_identities<S: IdentityStore + ?Sized>(store: &S) -> Result<usize> {
    let count = store.load_identities()?.len();
    store.save_identities(&[])?;
    log::info!("cleared {count} identities");
    Ok(count)
}
