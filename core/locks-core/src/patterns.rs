//! Compiled regex patterns for parsing source files.
//!
//! Compiled once on first use. The grammar is intentionally narrow: one of the
//! recognized key names, `=`, a single-quoted value, and a trailing semicolon.
//! Extend the key list only when a new layout property actually shows up.

use once_cell::sync::Lazy;
use regex::Regex;

/// Key names whose value names the physical layout artifact of a report object.
pub const LAYOUT_REFERENCE_KEYS: [&str; 2] = ["LayoutFile", "RDLCLayout"];

// ═══════════════════════════════════════════════════════════════════════════════
// Layout Reference Regexes
// ═══════════════════════════════════════════════════════════════════════════════

/// `LayoutFile = 'layouts/invoice.rdl';` (key names matched case-insensitively).
/// Capture 1 is the key, capture 2 the quoted value.
pub static RE_LAYOUT_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({})\s*=\s*'([^']*)'\s*;",
        LAYOUT_REFERENCE_KEYS.join("|")
    ))
    .unwrap()
});
