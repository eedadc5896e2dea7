//! Parsing of `git lfs locks --json` output.
//!
//! The authority prints one of:
//!
//! ```json
//! []
//! [{ "id": "1", "path": "a.bin", "owner": { "name": "pete" }, "locked_at": "..." }]
//! { "locks": [ ...same records... ] }
//! ```
//!
//! or nothing at all when there are no locks. All three map to the same
//! record list. Anything else is a `Parse` error that keeps the raw payload.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{LockError, Result};
use crate::types::LockRecord;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LockListPayload {
    Bare(Vec<RawLock>),
    Wrapped {
        #[serde(default)]
        locks: Vec<RawLock>,
    },
}

#[derive(Debug, Deserialize)]
struct RawLock {
    id: RawId,
    path: String,
    #[serde(default)]
    owner: Option<RawOwner>,
    #[serde(default)]
    locked_at: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    #[serde(default)]
    name: String,
}

/// Some servers report numeric ids. Both forms become the same opaque string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(id) => id,
            RawId::Number(id) => id.to_string(),
        }
    }
}

/// Parses authority output into validated records, preserving reporting order.
pub fn parse_lock_list(raw: &str) -> Result<Vec<LockRecord>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let payload: LockListPayload = serde_json::from_str(raw).map_err(|e| LockError::Parse {
        details: e.to_string(),
        raw: raw.to_string(),
    })?;

    let raw_locks = match payload {
        LockListPayload::Bare(locks) => locks,
        LockListPayload::Wrapped { locks } => locks,
    };

    let mut seen_ids = HashSet::new();
    let mut seen_paths = HashSet::new();
    let mut records = Vec::with_capacity(raw_locks.len());

    for lock in raw_locks {
        let id = lock.id.into_string();
        if id.trim().is_empty() {
            return Err(invalid(raw, "lock with an empty id"));
        }
        let owner = lock.owner.map(|o| o.name).unwrap_or_default();
        let record = LockRecord::new(id, &lock.path, owner, lock.locked_at);

        if record.path().is_empty() {
            return Err(invalid(raw, &format!("lock {} has an empty path", record.id())));
        }
        if !seen_ids.insert(record.id().to_string()) {
            return Err(invalid(raw, &format!("duplicate lock id {}", record.id())));
        }
        if !seen_paths.insert(record.path().to_string()) {
            return Err(invalid(raw, &format!("duplicate lock path {}", record.path())));
        }
        records.push(record);
    }

    Ok(records)
}

fn invalid(raw: &str, details: &str) -> LockError {
    LockError::Parse {
        details: details.to_string(),
        raw: raw.to_string(),
    }
}
