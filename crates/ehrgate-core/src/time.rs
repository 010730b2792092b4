use crate::error::{CoreError, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Parses a ledger timestamp given either as unix seconds or RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return Ok(seconds);
    }
    OffsetDateTime::parse(value, &Rfc3339)
        .map(|dt| dt.unix_timestamp())
        .map_err(|e| CoreError::invalid_timestamp(format!("'{value}': {e}")))
}

/// Formats unix seconds as RFC 3339, falling back to the raw number when the
/// value is out of range.
pub fn format_timestamp(seconds: i64) -> String {
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| seconds.to_string())
}
