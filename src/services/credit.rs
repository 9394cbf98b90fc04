use crate::models::credit_report::is_valid_score;
use once_cell::sync::Lazy;
use regex::Regex;

static SCORE_AFTER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)score[^\n]{0,20}?\b(\d{3})\b").expect("valid regex"));

const BUREAUS: &[&str] = &["Equifax", "Experian", "TransUnion"];

/// Finds the first plausible score that follows the word "score".
pub fn detect_score(text: &str) -> Option<i64> {
    SCORE_AFTER_LABEL
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<i64>().ok())
        .find(|score| is_valid_score(*score))
}

pub fn detect_bureau(text: &str) -> String {
    let lower = text.to_lowercase();
    BUREAUS
        .iter()
        .find(|bureau| lower.contains(&bureau.to_lowercase()))
        .map(|bureau| bureau.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// One factor per non-empty line, with list markers stripped.
pub fn parse_factors(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_read_after_label() {
        assert_eq!(detect_score("Report 2024\nFICO Score 8: 712 (Good)"), Some(712));
        assert_eq!(detect_score("Your credit score is 655."), Some(655));
    }

    #[test]
    fn out_of_range_numbers_are_skipped() {
        assert_eq!(detect_score("Score ID 123. Later, score: 801"), Some(801));
        assert_eq!(detect_score("Balance 712"), None);
        assert_eq!(detect_score("score 999"), None);
    }

    #[test]
    fn bureau_is_matched_case_insensitively() {
        assert_eq!(detect_bureau("TRANSUNION consumer disclosure"), "TransUnion");
        assert_eq!(detect_bureau("credit karma"), "unknown");
    }

    #[test]
    fn factors_drop_list_markers() {
        let factors = parse_factors("1. Late payments\n\n- High utilization\n* Short history");
        assert_eq!(factors, vec!["Late payments", "High utilization", "Short history"]);
    }
}
