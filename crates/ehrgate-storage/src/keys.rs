//! Composite key encoding.
//!
//! A composite key is an object-type tag followed by an ordered tuple of
//! string attributes:
//!
//! ```text
//! U+0000 tag U+0000 attr1 U+0000 attr2 U+0000 ...
//! ```
//!
//! Every component is terminated by the separator, so the encoding of a
//! partial attribute tuple is a byte prefix of every full encoding that shares
//! those leading attributes, and `p1` never matches `p10`. The separator is
//! reserved: tags and attributes containing it are rejected, which keeps the
//! encoding injective without an escaping scheme. Because the separator sorts
//! below every other byte, byte order of encoded keys equals lexicographic
//! order of the `(tag, attributes)` tuples.

use crate::error::StorageError;
use crate::StorageResult;

/// Reserved component separator.
pub const KEY_SEPARATOR: char = '\u{0000}';

/// Encodes a full or partial composite key.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey` if the tag is empty or any component
/// contains [`KEY_SEPARATOR`].
pub fn encode_key(object_type: &str, attributes: &[&str]) -> StorageResult<String> {
    if object_type.is_empty() {
        return Err(StorageError::invalid_key("object type must not be empty"));
    }
    check_component("object type", object_type)?;

    let capacity = 2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push(KEY_SEPARATOR);
    key.push_str(object_type);
    key.push(KEY_SEPARATOR);
    for attribute in attributes {
        check_component("attribute", attribute)?;
        key.push_str(attribute);
        key.push(KEY_SEPARATOR);
    }
    Ok(key)
}

/// Encodes a scan prefix. Identical to [`encode_key`]; the separate name
/// documents intent at call sites.
pub fn encode_prefix(object_type: &str, attributes: &[&str]) -> StorageResult<String> {
    encode_key(object_type, attributes)
}

/// Splits an encoded key back into its tag and attributes.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey` if `key` is not a composite key.
pub fn decode_key(key: &str) -> StorageResult<(String, Vec<String>)> {
    let body = key
        .strip_prefix(KEY_SEPARATOR)
        .and_then(|rest| rest.strip_suffix(KEY_SEPARATOR))
        .ok_or_else(|| StorageError::invalid_key("not a composite key"))?;

    let mut parts = body.split(KEY_SEPARATOR);
    let object_type = parts
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StorageError::invalid_key("composite key has no object type"))?;
    Ok((
        object_type.to_string(),
        parts.map(str::to_string).collect(),
    ))
}

fn check_component(what: &str, value: &str) -> StorageResult<()> {
    if value.contains(KEY_SEPARATOR) {
        return Err(StorageError::invalid_key(format!(
            "{what} contains the reserved separator U+0000"
        )));
    }
    Ok(())
}
