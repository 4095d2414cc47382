//! Origin authorization: per-identity grants that allow silent approval.
//!
//! A grant says "this origin may authenticate as this identity without an
//! interactive prompt". There is at most one grant per (identity, origin).
//! Grants are created on the first remembered approval, refreshed on every
//! silent approval, and removed on revoke.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::{Identity, IdentityId};
use crate::storage::{modify_identity, IdentityStore};

/// A stored exception allowing `origin` to authenticate silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginGrant {
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// `true` if `identity` holds a grant for `origin`. Empty origins never match.
pub fn is_origin_authorized(identity: &Identity, origin: &str) -> bool {
    !origin.is_empty()
        && identity
            .authorized_origins
            .iter()
            .any(|grant| grant.origin == origin)
}

/// Return the grant `identity` holds for `origin`, if any.
pub fn grant_for<'a>(identity: &'a Identity, origin: &str) -> Option<&'a OriginGrant> {
    identity
        .authorized_origins
        .iter()
        .find(|grant| grant.origin == origin)
}

/// Apply an authorization decision to an in-memory identity.
///
/// `authorize = true` creates the grant or refreshes its `lastUsedAt`;
/// `false` removes it. Always bumps `updatedAt`.
pub fn apply_authorization(
    identity: &mut Identity,
    origin: &str,
    authorize: bool,
    now: DateTime<Utc>,
) {
    if authorize {
        match identity
            .authorized_origins
            .iter_mut()
            .find(|grant| grant.origin == origin)
        {
            Some(grant) => grant.last_used_at = now,
            None => identity.authorized_origins.push(OriginGrant {
                origin: origin.to_string(),
                created_at: now,
                last_used_at: now,
            }),
        }
    } else {
        identity
            .authorized_origins
            .retain(|grant| grant.origin != origin);
    }
    identity.updated_at = Some(now);
}

/// Persist an authorization decision for `identity_id` at `origin`.
///
/// Returns the identity's updated grant list, or `None` when there is no
/// origin or the identity is not stored (nothing is written in either case).
pub fn set_authorization<S: IdentityStore + ?Sized>(
    store: &S,
    identity_id: &IdentityId,
    origin: &str,
    authorize: bool,
) -> Result<Option<Vec<OriginGrant>>> {
    if origin.is_empty() {
        return Ok(None);
    }
    let now = crate::time::now();
    let updated = modify_identity(store, identity_id, |identity| {
        apply_authorization(identity, origin, authorize, now)
    })?;
    if let Some(identity) = &updated {
        log::debug!(
            "origin {} {} for identity {}",
            origin,
            if authorize { "authorized" } else { "revoked" },
            identity.id
        );
    }
    Ok(updated.map(|identity| identity.authorized_origins))
}

/// Revoke `origin` for `identity_id`. Explicit user action.
pub fn revoke<S: IdentityStore + ?Sized>(
    store: &S,
    identity_id: &IdentityId,
    origin: &str,
) -> Result<Option<Vec<OriginGrant>>> {
    set_authorization(store, identity_id, origin, false)
}

/// List every (identity id, grant) pair in the store.
pub fn grants_for<S: IdentityStore + ?Sized>(store: &S) -> Result<Vec<(IdentityId, OriginGrant)>> {
    Ok(store
        .load_identities()?
        .into_iter()
        .flat_map(|identity| {
            let id = identity.id;
            identity
                .authorized_origins
                .into_iter()
                .map(move |grant| (id.clone(), grant))
        })
        .collect())
}
