//! Salary display-text parsing shared by the per-source mappings.

use once_cell::sync::Lazy;
use regex::Regex;

static RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").unwrap());
static ABOVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[Tt]rên\s*(\d+)").unwrap());
static BELOW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[Dd]ưới\s*(\d+)").unwrap());

/// Wording portals use when a posting has no numeric salary.
const NEGOTIABLE_TERMS: &[&str] = &[
    "thương lượng",
    "thỏa thuận",
    "thoả thuận",
    "cạnh tranh",
    "hấp dẫn",
    "negotiable",
    "competitive",
];

/// True when the display text signals a negotiable salary.
pub fn is_negotiable(text: &str) -> bool {
    let lower = text.to_lowercase();
    NEGOTIABLE_TERMS.iter().any(|term| lower.contains(term))
}

/// Extract `(min, max)` in millions from display strings like
/// "10 - 15 triệu", "Trên 30 triệu" or "Dưới 5 triệu". Anything
/// unrecognized, including negotiable wording, yields `(0, 0)`.
pub fn parse_display(text: &str) -> (i64, i64) {
    if text.is_empty() || text.to_lowercase().contains("thỏa thuận") {
        return (0, 0);
    }

    if let Some(caps) = RANGE_RE.captures(text) {
        let min = caps[1].parse().unwrap_or(0);
        let max = caps[2].parse().unwrap_or(0);
        return (min, max);
    }

    if let Some(caps) = ABOVE_RE.captures(text) {
        return (caps[1].parse().unwrap_or(0), 0);
    }

    if let Some(caps) = BELOW_RE.captures(text) {
        return (0, caps[1].parse().unwrap_or(0));
    }

    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_range_above_below() {
        assert_eq!(parse_display("10 - 15 triệu"), (10, 15));
        assert_eq!(parse_display("Trên 30 triệu"), (30, 0));
        assert_eq!(parse_display("Dưới 5 triệu"), (0, 5));
        assert_eq!(parse_display("dưới 8 triệu"), (0, 8));
    }

    #[test]
    fn negotiable_and_unknown_texts_parse_to_zero() {
        assert_eq!(parse_display("Thỏa thuận"), (0, 0));
        assert_eq!(parse_display("Lên đến đâu hay đến đó"), (0, 0));
        assert_eq!(parse_display(""), (0, 0));
    }

    #[test]
    fn recognizes_every_negotiable_phrasing() {
        for text in [
            "Thương lượng",
            "Lương thỏa thuận",
            "Thoả thuận khi phỏng vấn",
            "Cạnh tranh",
            "Mức lương hấp dẫn",
            "Negotiable",
            "Competitive salary",
        ] {
            assert!(is_negotiable(text), "{text}");
        }
        assert!(!is_negotiable("10 - 15 triệu"));
    }
}
