//! Card-suffix extraction from free-text account names.
//!
//! Account names extracted from receipts arrive as "Visa ****1234",
//! "Visa ending in 1234", or "招行 尾号1234". The suffix is the only stable
//! key across those spellings. Extraction is best-effort: with multiple
//! embedded numbers the last marker-introduced match wins, and a bare name
//! only qualifies when it *ends* with a 4+ digit run.

use std::sync::OnceLock;

use regex::Regex;

use super::strict_key;

/// Suffix introduced by an explicit marker, anywhere in the name.
fn marked_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\*{2,}|尾号|末四位|ending\s+in)\s*([0-9]{4,})")
            .expect("marked card-suffix pattern is valid")
    })
}

/// Bare digit run at the end of the name.
fn trailing_digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]{4,})$").expect("trailing card-suffix pattern is valid")
    })
}

/// Extracts the card suffix from an account display name, if any.
///
/// Returns the final four digits of the matched run, so "****123456" and
/// "ending in 3456" compare equal.
///
/// # Examples
///
/// ```
/// use tallybook::normalize::card_suffix;
///
/// assert_eq!(card_suffix("Visa ****1234"), Some("1234".to_string()));
/// assert_eq!(card_suffix("Visa ending in 1234"), Some("1234".to_string()));
/// assert_eq!(card_suffix("招商银行 尾号1234"), Some("1234".to_string()));
/// assert_eq!(card_suffix("Petty cash"), None);
/// ```
#[must_use]
pub fn card_suffix(name: &str) -> Option<String> {
    // Strict key first: folds full-width digits and lowercases "ENDING IN".
    let key = strict_key(name);

    let digits = marked_suffix_re()
        .captures_iter(&key)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let digits = match digits {
        Some(d) => d,
        None => trailing_digits_re().captures(&key)?.get(1)?.as_str(),
    };

    let tail_start = digits.len() - 4;
    Some(digits[tail_start..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_forms() {
        assert_eq!(card_suffix("Visa **1234"), Some("1234".to_string()));
        assert_eq!(card_suffix("Visa ****1234"), Some("1234".to_string()));
        assert_eq!(card_suffix("****  5678"), Some("5678".to_string()));
    }

    #[test]
    fn test_spelled_out_forms() {
        assert_eq!(card_suffix("Visa ending in 1234"), Some("1234".to_string()));
        assert_eq!(card_suffix("Visa ENDING IN 1234"), Some("1234".to_string()));
        assert_eq!(card_suffix("招商银行 尾号1234"), Some("1234".to_string()));
        assert_eq!(card_suffix("工行末四位0099"), Some("0099".to_string()));
    }

    #[test]
    fn test_full_width_digits_fold() {
        assert_eq!(card_suffix("尾号１２３４"), Some("1234".to_string()));
    }

    #[test]
    fn test_bare_trailing_run() {
        assert_eq!(card_suffix("CMB 6214"), Some("6214".to_string()));
        assert_eq!(card_suffix("CMB 62145678"), Some("5678".to_string()));
    }

    #[test]
    fn test_long_runs_compare_on_final_four() {
        assert_eq!(card_suffix("****123456"), Some("3456".to_string()));
        assert_eq!(
            card_suffix("****123456"),
            card_suffix("ending in 3456"),
        );
    }

    #[test]
    fn test_last_marker_wins() {
        assert_eq!(
            card_suffix("**1111 transferred to **2222"),
            Some("2222".to_string())
        );
    }

    #[test]
    fn test_no_suffix() {
        assert_eq!(card_suffix("Petty cash"), None);
        assert_eq!(card_suffix("Visa 123"), None);
        // Digits in the middle without a marker do not qualify.
        assert_eq!(card_suffix("Branch 1234 office card"), None);
        assert_eq!(card_suffix(""), None);
    }
}
