//! Name normalization.
//!
//! Two names denote the same entity iff their *strict* keys are equal:
//! NFKC-folded (full-width to half-width), trimmed, inner whitespace
//! collapsed, lowercased with the Unicode default mapping so the result
//! never depends on the host locale.
//!
//! The *heuristic* key additionally strips legal-entity suffixes and generic
//! storefront words. It exists only to raise find-or-create recall during AI
//! ingestion and is never used to raise conflicts.

mod card_suffix;

pub use card_suffix::card_suffix;

use unicode_normalization::UnicodeNormalization;

/// Legal-entity suffixes stripped by the heuristic key, in strict-key form.
/// Longer forms come first so compounds strip before their tails.
const LEGAL_SUFFIXES: &[&str] = &[
    "股份有限公司",
    "有限责任公司",
    "有限公司",
    "公司",
    "co., ltd.",
    "co.,ltd.",
    "co., ltd",
    "co.,ltd",
    "co. ltd",
    "ltd.",
    "ltd",
    "llc",
    "inc.",
    "inc",
    "corp.",
    "corp",
    "gmbh",
];

/// Generic storefront words stripped by the heuristic key.
const STOREFRONT_WORDS: &[&str] = &[
    "旗舰店",
    "专卖店",
    "专营店",
    "便利店",
    "连锁店",
    "超市",
    "商行",
    "商店",
    "门店",
    "店",
    "store",
    "shop",
];

/// Placeholder names produced while an AI extraction is still in flight,
/// in strict-key form with trailing ellipses removed.
const PLACEHOLDER_KEYS: &[&str] = &[
    "processing",
    "recognizing",
    "pending recognition",
    "识别中",
    "待识别",
    "处理中",
];

/// Converts a display name to its strict comparison key.
///
/// Pure and total: defined for any string, including the empty string.
///
/// # Examples
///
/// ```
/// use tallybook::normalize::strict_key;
///
/// assert_eq!(strict_key("  Acme   Ltd "), "acme ltd");
/// assert_eq!(strict_key("ＡＣＭＥ"), "acme");
/// ```
#[must_use]
pub fn strict_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for ch in name.nfkc() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        }
    }
    out
}

/// Converts a display name to its loose ingestion key.
///
/// Strips trailing legal-entity suffixes and storefront words from the
/// strict key, repeatedly, so "杭州酒类专营店有限公司" and "杭州酒类" meet.
/// Falls back to the strict key when stripping would empty the name.
#[must_use]
pub fn heuristic_key(name: &str) -> String {
    let strict = strict_key(name);
    let mut key = strict.as_str();

    loop {
        let stripped = strip_one_suffix(key);
        if stripped.len() == key.len() {
            break;
        }
        key = stripped;
    }

    let key = key.trim_end_matches([' ', ',', '.', '·', '-', '(', ')']);
    if key.is_empty() {
        strict
    } else {
        key.to_string()
    }
}

fn strip_one_suffix(key: &str) -> &str {
    for suffix in LEGAL_SUFFIXES.iter().chain(STOREFRONT_WORDS) {
        if let Some(rest) = key.strip_suffix(suffix) {
            let rest = rest.trim_end_matches([' ', ',', '.', '·', '-']);
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    key
}

/// Returns true when the name is a known recognition-in-flight placeholder.
///
/// `extra` extends the built-in set with tenant- or deployment-specific
/// placeholders (compared by strict key).
#[must_use]
pub fn is_placeholder(name: &str, extra: &[String]) -> bool {
    let key = strict_key(name);
    let trimmed = key.trim_end_matches(['…', '.', ' ']);
    if trimmed.is_empty() {
        return false;
    }
    PLACEHOLDER_KEYS.contains(&trimmed)
        || extra
            .iter()
            .any(|p| strict_key(p).trim_end_matches(['…', '.', ' ']) == trimmed)
}
