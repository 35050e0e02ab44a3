use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use unidecode::unidecode;

/// Turns free text into a URL-safe slug: lowercase letters, digits and
/// single hyphens only, no leading or trailing hyphen.
pub fn slugify(text: &str) -> String {
    lazy_static! {
        static ref SPACES: Regex = Regex::new(r"\s+").unwrap();
        static ref INVALID: Regex = Regex::new(r"[^a-z0-9-]").unwrap();
        static ref HYPHENS: Regex = Regex::new(r"-{2,}").unwrap();
    }

    let text = unidecode(text).to_lowercase();
    let text = SPACES.replace_all(&text, "-");
    let text = INVALID.replace_all(&text, "");
    let text = HYPHENS.replace_all(&text, "-");
    text.trim_matches('-').to_string()
}

/// Directory-naming prefix for a post: two-digit year, month and day.
/// 2026-01-17 becomes "26-01-17".
pub fn dir_prefix(date: &NaiveDate) -> String {
    date.format("%y-%m-%d").to_string()
}

/// Ordinal suffix for a day of month. Teens are always "th".
pub fn ordinal(day: u32) -> &'static str {
    match day % 100 {
        11..=13 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}

/// Display form used in rendered posts, e.g. "17th January 2026".
pub fn display_date(date: &NaiveDate) -> String {
    let day = date.day();
    format!("{}{} {} {}", day, ordinal(day), date.format("%B"), date.year())
}

/// Parses the date carried by an index record. Older records use a few
/// different formats, the newest ones use ISO dates.
pub fn parse_post_date(date_str: &str) -> Result<NaiveDate, String> {
    // Records converted from the first-generation index may carry an
    // epoch-milliseconds timestamp instead of a date string.
    if let Ok(millis) = date_str.parse::<i64>() {
        return match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis) {
            Some(dt) => Ok(dt.date_naive()),
            None => Err(format!("Timestamp out of range: {}", date_str)),
        };
    }

    for fmt in ["%Y-%m-%d", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, fmt) {
            return Ok(date);
        }
    }

    Err(format!("Unable to parse post date {}", date_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Simple Title"), "simple-title");
        assert_eq!(slugify("Title With Numbers 123"), "title-with-numbers-123");
        assert_eq!(slugify("Special!@# Characters$%^"), "special-characters");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("CamelCase Text"), "camelcase-text");
        assert_eq!(slugify("--- trimmed ---"), "trimmed");
        assert_eq!(slugify("Café à Paris"), "cafe-a-paris");
    }

    #[test]
    fn test_slugify_charset() {
        let slug = slugify("  What's new_in 2026?! (a review) ");
        assert!(!slug.starts_with('-'));
        assert!(!slug.ends_with('-'));
        assert!(!slug.contains("--"));
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_dir_prefix() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 17).unwrap();
        assert_eq!(dir_prefix(&date), "26-01-17");
        let date = NaiveDate::from_ymd_opt(2025, 12, 5).unwrap();
        assert_eq!(dir_prefix(&date), "25-12-05");
    }

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(1), "st");
        assert_eq!(ordinal(2), "nd");
        assert_eq!(ordinal(3), "rd");
        assert_eq!(ordinal(4), "th");
        assert_eq!(ordinal(11), "th");
        assert_eq!(ordinal(12), "th");
        assert_eq!(ordinal(13), "th");
        assert_eq!(ordinal(20), "th");
        assert_eq!(ordinal(21), "st");
        assert_eq!(ordinal(22), "nd");
        assert_eq!(ordinal(23), "rd");
        assert_eq!(ordinal(30), "th");
        assert_eq!(ordinal(31), "st");
    }

    #[test]
    fn test_display_date() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 17).unwrap();
        assert_eq!(display_date(&date), "17th January 2026");
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(display_date(&date), "1st December 2025");
    }

    #[test]
    fn test_parse_post_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 5).unwrap();
        assert_eq!(parse_post_date("2025-12-05").unwrap(), expected);
        assert_eq!(parse_post_date("Dec 05, 2025").unwrap(), expected);
        assert_eq!(parse_post_date("5 December 2025").unwrap(), expected);
        // Epoch milliseconds from first-generation records
        assert_eq!(parse_post_date("1764892800000").unwrap(), expected);

        assert!(parse_post_date("soon").is_err());
    }
}
