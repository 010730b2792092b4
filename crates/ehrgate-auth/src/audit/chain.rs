//! Hash chain over audit entries.

use ehrgate_core::AuditEntry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// `prevHash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Position of the newest entry, stored under its own key so appends do not
/// need a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHead {
    pub sequence: u64,
    pub hash: String,
}

impl ChainHead {
    pub fn genesis() -> Self {
        Self {
            sequence: 0,
            hash: GENESIS_HASH.to_string(),
        }
    }
}

/// SHA-256 (hex) over the canonical JSON of `entry` without its `hash` field.
pub fn entry_hash(entry: &AuditEntry) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(entry)?;
    if let Value::Object(fields) = &mut value {
        fields.remove("hash");
    }
    let canonical = serde_json::to_string(&canonicalize(value))?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

// Object keys sorted at every depth.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut sorted: Vec<(String, Value)> = fields.into_iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// First inconsistency found while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    pub sequence: u64,
    pub problem: String,
}

/// Walks `entries` (sorted by sequence) from genesis and checks sequence
/// continuity, back links and content hashes against `head`.
///
/// Returns the number of verified entries.
pub fn verify_entries(entries: &[AuditEntry], head: &ChainHead) -> Result<u64, ChainBreak> {
    let mut expected = ChainHead::genesis();
    for entry in entries {
        let sequence = expected.sequence + 1;
        if entry.sequence != sequence {
            return Err(ChainBreak {
                sequence,
                problem: format!("found sequence {} instead", entry.sequence),
            });
        }
        if entry.prev_hash != expected.hash {
            return Err(ChainBreak {
                sequence,
                problem: "previous-hash link does not match".to_string(),
            });
        }
        let recomputed = entry_hash(entry).map_err(|e| ChainBreak {
            sequence,
            problem: e.to_string(),
        })?;
        if recomputed != entry.hash {
            return Err(ChainBreak {
                sequence,
                problem: "content hash does not match".to_string(),
            });
        }
        expected = ChainHead {
            sequence,
            hash: recomputed,
        };
    }
    if &expected != head {
        return Err(ChainBreak {
            sequence: head.sequence,
            problem: format!(
                "head points at sequence {} but the chain ends at {}",
                head.sequence, expected.sequence
            ),
        });
    }
    Ok(expected.sequence)
}
