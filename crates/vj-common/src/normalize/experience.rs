//! Experience buckets: A=0, B=0–1, C=1–2, D=2–3, E=3–5, F=5+ years.
//!
//! A posting's tag list is the set of candidate seniorities eligible to
//! apply, so a requirement always includes every bucket above it.

fn tags(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

/// Map a display-text requirement ("2 năm", "Không yêu cầu", …) to tags.
pub fn tags_for_text(experience: &str) -> Vec<String> {
    let exp = experience.trim();

    if exp.is_empty() || exp.contains("Không yêu cầu") || exp.contains("Chưa có kinh nghiệm")
    {
        return tags(&["A", "B", "C", "D", "E", "F"]);
    }
    if exp.contains("Dưới 1 năm") {
        return tags(&["B", "C", "D", "E", "F"]);
    }
    if exp.contains("Hơn 5 năm") || exp.contains("Trên 5 năm") {
        return tags(&["F"]);
    }

    match leading_int(exp) {
        years if years <= 1 => tags(&["C", "D", "E", "F"]),
        2 => tags(&["D", "E", "F"]),
        3..=5 => tags(&["E", "F"]),
        _ => tags(&["F"]),
    }
}

/// Alternate mapping from a bare year count, used where the API reports a
/// numeric `yearsOfExperience` instead of display text.
pub fn tags_for_years(years: i64) -> Vec<String> {
    match years {
        i64::MIN..=1 => tags(&["A", "B"]),
        2 => tags(&["C"]),
        3..=5 => tags(&["D"]),
        6..=10 => tags(&["E"]),
        _ => tags(&["F"]),
    }
}

/// Leading integer of a string like "3 năm"; 0 when none is present.
fn leading_int(text: &str) -> i64 {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_requirement_admits_everyone() {
        assert_eq!(tags_for_text(""), vec!["A", "B", "C", "D", "E", "F"]);
        assert_eq!(
            tags_for_text("Không yêu cầu"),
            vec!["A", "B", "C", "D", "E", "F"]
        );
        assert_eq!(
            tags_for_text("Chưa có kinh nghiệm"),
            vec!["A", "B", "C", "D", "E", "F"]
        );
    }

    #[test]
    fn text_requirements_map_to_suffixes_of_the_order() {
        assert_eq!(tags_for_text("Dưới 1 năm"), vec!["B", "C", "D", "E", "F"]);
        assert_eq!(tags_for_text("1 năm"), vec!["C", "D", "E", "F"]);
        assert_eq!(tags_for_text("2 năm"), vec!["D", "E", "F"]);
        assert_eq!(tags_for_text("3 năm"), vec!["E", "F"]);
        assert_eq!(tags_for_text("5 năm"), vec!["E", "F"]);
        assert_eq!(tags_for_text("7 năm"), vec!["F"]);
        assert_eq!(tags_for_text("Hơn 5 năm"), vec!["F"]);
        assert_eq!(tags_for_text("Trên 5 năm"), vec!["F"]);
    }

    #[test]
    fn numeric_years_use_the_alternate_buckets() {
        assert_eq!(tags_for_years(0), vec!["A", "B"]);
        assert_eq!(tags_for_years(1), vec!["A", "B"]);
        assert_eq!(tags_for_years(2), vec!["C"]);
        assert_eq!(tags_for_years(4), vec!["D"]);
        assert_eq!(tags_for_years(8), vec!["E"]);
        assert_eq!(tags_for_years(12), vec!["F"]);
    }
}
