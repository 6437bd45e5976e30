//! Join protocol helpers: code normalization and shared-key matching.
//!
//! A join code is the leading characters of a trip id, typed by a human.
//! Everything here is pure; the engine performs the storage calls.

use crate::error::{Error, Result};
use crate::models::JOIN_CODE_LEN;
use crate::store::TRIP_KEY_PREFIX;

/// Normalize a human-typed join code: lowercase, strip everything that
/// is not alphanumeric, and cut to the fixed code length. Rejected
/// before any storage call when too short.
pub fn normalize_code(input: &str) -> Result<String> {
    let normalized: String = input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if normalized.len() < JOIN_CODE_LEN {
        return Err(Error::InvalidCode { min: JOIN_CODE_LEN });
    }
    Ok(normalized[..JOIN_CODE_LEN].to_string())
}

/// Find the shared-namespace key whose trip id starts with the
/// normalized code. Zero matches and multiple matches are both
/// reportable failures; a prefix collision is surfaced rather than
/// silently resolved to an arbitrary record.
pub(super) fn match_shared_key<'a>(keys: &'a [String], code: &str) -> Result<&'a str> {
    let mut matches = keys.iter().filter(|key| {
        key.strip_prefix(TRIP_KEY_PREFIX)
            .is_some_and(|id| id.to_ascii_lowercase().starts_with(code))
    });

    let Some(first) = matches.next() else {
        return Err(Error::CodeNotFound(code.to_string()));
    };
    if matches.next().is_some() {
        return Err(Error::AmbiguousCode(code.to_string()));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_and_lowercases() {
        assert_eq!(normalize_code("AB-12 cd3").unwrap(), "ab12cd3");
        assert_eq!(normalize_code("  0F7c2A9  ").unwrap(), "0f7c2a9");
    }

    #[test]
    fn test_normalize_truncates_long_input() {
        assert_eq!(normalize_code("abcdef0123456789").unwrap(), "abcdef0");
    }

    #[test]
    fn test_normalize_rejects_short_codes() {
        assert!(matches!(
            normalize_code("ab12"),
            Err(Error::InvalidCode { .. })
        ));
        assert!(matches!(
            normalize_code("--- ---"),
            Err(Error::InvalidCode { .. })
        ));
    }

    #[test]
    fn test_match_single_key() {
        let keys = vec![
            "trip:0f7c2a9e-aaaa".to_string(),
            "trip:1234567-bbbb".to_string(),
        ];
        assert_eq!(
            match_shared_key(&keys, "0f7c2a9").unwrap(),
            "trip:0f7c2a9e-aaaa"
        );
    }

    #[test]
    fn test_match_reports_missing_code() {
        let keys = vec!["trip:0f7c2a9e".to_string()];
        assert!(matches!(
            match_shared_key(&keys, "fffffff"),
            Err(Error::CodeNotFound(_))
        ));
    }

    #[test]
    fn test_match_surfaces_prefix_collision() {
        let keys = vec![
            "trip:0f7c2a9e-aaaa".to_string(),
            "trip:0f7c2a9d-bbbb".to_string(),
        ];
        assert!(matches!(
            match_shared_key(&keys, "0f7c2a9"),
            Err(Error::AmbiguousCode(_))
        ));
    }

    #[test]
    fn test_match_ignores_foreign_keys() {
        let keys = vec!["other:0f7c2a9e".to_string()];
        assert!(matches!(
            match_shared_key(&keys, "0f7c2a9"),
            Err(Error::CodeNotFound(_))
        ));
    }
}
