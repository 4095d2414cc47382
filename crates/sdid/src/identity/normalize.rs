//! Lenient loading of stored identity records.
//!
//! Records written by older or foreign tooling are accepted loosely: list
//! fields may be comma-separated strings, keys may be JSON-encoded strings,
//! and grants may be partial. Anything that is not an object is dropped.

use chrono::{DateTime, Utc};
use p256::elliptic_curve::JwkEcKey;
use serde_json::Value;

use super::record::{Identity, IdentityId};
use crate::authorization::OriginGrant;
use crate::time::parse_rfc3339;

/// Split a comma-separated list, trimming and dropping empty items.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize one raw identity record. Returns `None` for non-objects.
pub fn normalize_identity(raw: &Value) -> Option<Identity> {
    let obj = raw.as_object()?;
    let now = crate::time::now();

    let id = string_field(raw, "id")
        .filter(|s| !s.is_empty())
        .map(IdentityId)
        .unwrap_or_else(IdentityId::random);

    Some(Identity {
        id,
        label: string_field(raw, "label").unwrap_or_default(),
        did: string_field(raw, "did").filter(|s| !s.is_empty()),
        public_key: jwk_field(raw, &["publicKeyJwk", "publicKey"]),
        private_key: jwk_field(raw, &["privateKeyJwk", "privateKey"]),
        roles: list_field(obj.get("roles")),
        domain: string_field(raw, "domain").unwrap_or_default(),
        tags: list_field(obj.get("tags")),
        notes: string_field(raw, "notes").unwrap_or_default(),
        authorized_origins: normalize_grants(obj.get("authorizedOrigins"), now),
        created_at: time_field(raw, "createdAt"),
        updated_at: time_field(raw, "updatedAt"),
    })
}

/// Normalize a grant list: drop entries without an origin, backfill
/// timestamps, and collapse duplicates on origin (keeping the most recent
/// `lastUsedAt` and the earliest `createdAt`).
pub fn normalize_grants(raw: Option<&Value>, now: DateTime<Utc>) -> Vec<OriginGrant> {
    let Some(entries) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut grants: Vec<OriginGrant> = Vec::new();
    for entry in entries {
        let Some(origin) = string_field(entry, "origin").filter(|o| !o.is_empty()) else {
            continue;
        };
        let created = time_field(entry, "createdAt");
        let last_used = time_field(entry, "lastUsedAt");
        let created_at = created.or(last_used).unwrap_or(now);
        let last_used_at = last_used.or(created).unwrap_or(now);

        match grants.iter_mut().find(|g| g.origin == origin) {
            Some(existing) => {
                existing.created_at = existing.created_at.min(created_at);
                existing.last_used_at = existing.last_used_at.max(last_used_at);
            }
            None => grants.push(OriginGrant {
                origin,
                created_at,
                last_used_at,
            }),
        }
    }
    grants
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn list_field(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => parse_list(s),
        _ => Vec::new(),
    }
}

fn jwk_field(raw: &Value, keys: &[&str]) -> Option<JwkEcKey> {
    let value = keys.iter().find_map(|k| raw.get(*k))?;
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

fn time_field(raw: &Value, key: &str) -> Option<DateTime<Utc>> {
    match raw.get(key)? {
        Value::String(s) => parse_rfc3339(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}
