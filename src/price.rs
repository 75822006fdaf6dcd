use std::sync::LazyLock;

use regex::Regex;

static NON_PRICE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.,]").unwrap());

/// Pound sign as it appears when a Latin-1 page is mis-decoded as UTF-8.
const MOJIBAKE_POUND: &str = "\u{00c2}\u{00a3}";

/// Repair the known currency-symbol mojibake in a raw price string.
pub fn repair_mojibake(raw: &str) -> String {
    if raw.contains(MOJIBAKE_POUND) {
        raw.replace(MOJIBAKE_POUND, "\u{00a3}")
    } else {
        raw.to_string()
    }
}

/// Convert a localized price string ("£51.77", "1.234,56 €") to a float.
///
/// Currency symbols and other noise are stripped first; when both comma and
/// period survive, the rightmost one is taken as the decimal separator.
/// Returns `None` when no parseable number remains.
pub fn normalize_price(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    let cleaned = NON_PRICE_CHARS.replace_all(raw, "");
    let candidate = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // Comma is rightmost: periods are thousands separators.
        (Some(c), Some(p)) if c > p => cleaned.replace('.', "").replace(',', "."),
        // Period is rightmost: commas are thousands separators.
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        // Comma alone acts as the decimal separator.
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned.into_owned(),
    };
    candidate.parse::<f64>().ok()
}

// ── Tests ──
