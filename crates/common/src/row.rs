//! Row encoding: columns are joined by `|` with no escaping, matching the on-disk
//! format this engine preserves for compatibility. Callers must avoid `|` inside
//! values; there is no way to distinguish an embedded delimiter from a column break.

use crate::{DbError, DbResult};

pub const DELIMITER: char = '|';
pub const MAX_ROW_BYTES: usize = 255;

/// Join column values into the on-disk row representation.
pub fn encode(columns: &[impl AsRef<str>]) -> DbResult<String> {
    let joined = columns
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string());
    if joined.len() > MAX_ROW_BYTES {
        return Err(DbError::Usage(format!(
            "encoded row is {} bytes, exceeds the {}-byte limit",
            joined.len(),
            MAX_ROW_BYTES
        )));
    }
    Ok(joined)
}

/// Split a stored row back into its column strings.
pub fn decode(raw: &str) -> Vec<String> {
    raw.split(DELIMITER).map(str::to_string).collect()
}

/// The first column of a row is always the primary key.
pub fn primary_key(raw: &str) -> Option<i32> {
    raw.split(DELIMITER).next()?.parse().ok()
}

/// Replace the value of one column (by ordinal) and re-join.
pub fn with_column_replaced(raw: &str, ordinal: usize, new_value: &str) -> DbResult<String> {
    let mut columns = decode(raw);
    if ordinal >= columns.len() {
        return Err(DbError::Usage(format!(
            "column ordinal {ordinal} out of range for row with {} columns",
            columns.len()
        )));
    }
    columns[ordinal] = new_value.to_string();
    encode(&columns)
}

/// Strip surrounding whitespace and, if present, a single matching pair of single quotes.
pub fn trim_literal(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let cols = vec!["1".to_string(), "Alice".to_string()];
        let encoded = encode(&cols).unwrap();
        assert_eq!(encoded, "1|Alice");
        assert_eq!(decode(&encoded), cols);
    }

    #[test]
    fn primary_key_is_first_column() {
        assert_eq!(primary_key("42|Alice|true"), Some(42));
        assert_eq!(primary_key("not-a-number|x"), None);
    }

    #[test]
    fn column_replacement_preserves_others() {
        let updated = with_column_replaced("1|Alice|30", 1, "Alicia").unwrap();
        assert_eq!(updated, "1|Alicia|30");
    }

    #[test]
    fn trim_literal_strips_quotes_and_whitespace() {
        assert_eq!(trim_literal("  'Alice'  "), "Alice");
        assert_eq!(trim_literal("42"), "42");
        assert_eq!(trim_literal("'it''s'"), "it''s");
    }

    #[test]
    fn encode_rejects_oversized_rows() {
        let huge = vec!["x".repeat(300)];
        assert!(encode(&huge).is_err());
    }
}
