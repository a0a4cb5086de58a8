use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_english::{parse_date_string, Dialect};

/// Accepts ISO dates (`2026-02-20`) and natural language (`next friday`).
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    let trimmed = date_str.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(trimmed, Utc::now(), Dialect::Us)
        .map(|moment| moment.date_naive())
        .map_err(|e| anyhow::anyhow!("Failed to parse date '{}': {}", date_str, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use rstest::rstest;

    #[rstest]
    #[case("2026-02-20", 2026, 2, 20)]
    #[case(" 2024-02-29 ", 2024, 2, 29)]
    fn parses_iso_dates(#[case] input: &str, #[case] y: i32, #[case] m: u32, #[case] d: u32) {
        assert_eq!(parse_date(input).unwrap(), NaiveDate::from_ymd_opt(y, m, d).unwrap());
    }

    #[test]
    fn parses_relative_dates() {
        let today = Utc::now().date_naive();
        assert_eq!(parse_date("tomorrow").unwrap(), today.checked_add_days(Days::new(1)).unwrap());
    }

    #[rstest]
    #[case("not a date")]
    #[case("blursday")]
    fn rejects_garbage(#[case] input: &str) {
        assert!(parse_date(input).is_err());
    }
}
