//! Result-count parsing and page arithmetic.
//!
//! Sites render result totals in whatever their locale fancies:
//! `"1.234 ofertas"`, `"12,345 results"`, `"100+"`, or a figure split with
//! non-breaking spaces. The count is the first digit run in the text with
//! any grouping characters removed.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ScrapeError;

/// First run of digits, allowing `.`/`,`/space/NBSP grouping inside.
fn count_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d[\d.,\u{a0}\u{202f} ]*").expect("count pattern must compile")
    })
}

/// Parses a result-count element's text into a number.
///
/// Tolerates `"100+"`, locale thousand separators (`"1.234"`, `"12,345"`),
/// and grouping spaces. The first digit run wins; everything else in the
/// text is ignored.
///
/// # Errors
///
/// Returns [`ScrapeError::ResultCount`] if the text contains no digits or
/// the digits overflow a `u32`.
pub fn parse_result_count(text: &str) -> Result<u32, ScrapeError> {
    let matched = count_pattern()
        .find(text)
        .ok_or_else(|| ScrapeError::ResultCount {
            text: text.to_string(),
        })?;

    let digits: String = matched
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    digits.parse().map_err(|_| ScrapeError::ResultCount {
        text: text.to_string(),
    })
}

/// Number of list pages needed for `total_results` at `page_size` per page.
///
/// Zero results means zero pages. A zero `page_size` is treated as 1 to
/// keep the arithmetic total.
#[must_use]
pub fn max_page(total_results: u32, page_size: u32) -> u32 {
    total_results.div_ceil(page_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_count() {
        assert_eq!(parse_result_count("345 results").unwrap(), 345);
    }

    #[test]
    fn parses_plus_suffix() {
        assert_eq!(parse_result_count("100+").unwrap(), 100);
    }

    #[test]
    fn parses_dot_thousands_separator() {
        assert_eq!(
            parse_result_count("1.234 ofertas de trabajo").unwrap(),
            1_234
        );
    }

    #[test]
    fn parses_comma_thousands_separator() {
        assert_eq!(parse_result_count("12,345 results").unwrap(), 12_345);
    }

    #[test]
    fn parses_nbsp_grouping() {
        assert_eq!(parse_result_count("1\u{a0}234 résultats").unwrap(), 1_234);
    }

    #[test]
    fn takes_first_digit_run() {
        assert_eq!(parse_result_count("Page 1 of 2 — 50 results").unwrap(), 1);
    }

    #[test]
    fn leading_text_is_ignored() {
        assert_eq!(parse_result_count("Showing 42 jobs").unwrap(), 42);
    }

    #[test]
    fn no_digits_is_an_error() {
        let err = parse_result_count("no results found").unwrap_err();
        assert!(matches!(err, ScrapeError::ResultCount { .. }));
    }

    #[test]
    fn max_page_rounds_up() {
        assert_eq!(max_page(100, 10), 10);
        assert_eq!(max_page(101, 10), 11);
        assert_eq!(max_page(9, 10), 1);
    }

    #[test]
    fn max_page_handles_degenerate_inputs() {
        assert_eq!(max_page(0, 10), 0);
        assert_eq!(max_page(5, 0), 5);
    }
}
