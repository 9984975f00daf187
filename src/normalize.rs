//! Shared key normalization for resume keys and merge keys.
//!
//! CRITICAL: every join and dedup comparison in the crate goes through
//! `normalize`. Changing it changes which rows the enricher treats as done
//! and which rows the merge stages pair up.

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Thousands separators and spacing found in scraped count cells:
/// "2,134,567", "2 134 567", "2\u{a0}134\u{a0}567"
pub static COUNT_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s\u{00A0}\u{202F}]").unwrap());

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Canonical form of a free-text key: surrounding whitespace trimmed,
/// case folded to lowercase. Nothing else is rewritten.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// First artist of a comma-joined artist list.
/// e.g., "Drake, 21 Savage" → "Drake"
pub fn primary_artist(artist_names: &str) -> &str {
    artist_names.split(',').next().unwrap_or("").trim()
}

/// Coerce a scraped count cell to an integer.
/// Accepts separators and float notation ("1,234", "1234.0");
/// blank, negative and unparseable values become None.
pub fn parse_count(value: &str) -> Option<u64> {
    let cleaned = COUNT_SEPARATORS.replace_all(value, "");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }
    let f = cleaned.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 {
        Some(f.round() as u64)
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
