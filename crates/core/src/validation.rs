//! Argument rules that go beyond a single field's declared type.

use crate::error::{ValidationError, ValidationResult};
use chrono::NaiveDate;

/// Largest recency window accepted, in days
pub const MAX_LAST_N_DAYS: i64 = 365;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    let invalid = || ValidationError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    };

    // chrono accepts unpadded months and days; the wire format does not
    if value.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())
}

/// Check a recency window length.
pub fn validate_last_n_days(field: &str, days: Option<i64>) -> ValidationResult<u32> {
    let days = days.ok_or_else(|| {
        ValidationError::combination(format!(
            "`{}` is required when range_or_recency is RECENCY",
            field
        ))
    })?;

    if !(1..=MAX_LAST_N_DAYS).contains(&days) {
        return Err(ValidationError::out_of_range(
            field,
            format!("must be between 1 and {} days, got {}", MAX_LAST_N_DAYS, days),
        ));
    }

    // Bounded above, so the conversion cannot fail
    u32::try_from(days).map_err(|_| ValidationError::out_of_range(field, "too large"))
}

/// Check that both ends of a date range are present, well-formed and ordered.
pub fn validate_date_range(
    begin: Option<&str>,
    end: Option<&str>,
) -> ValidationResult<(NaiveDate, NaiveDate)> {
    let (begin, end) = match (begin, end) {
        (Some(begin), Some(end)) => (begin, end),
        _ => {
            return Err(ValidationError::combination(
                "`date_range_begin` and `date_range_end` are both required when range_or_recency is RANGE",
            ))
        }
    };

    let begin = parse_date("date_range_begin", begin)?;
    let end = parse_date("date_range_end", end)?;

    if begin > end {
        return Err(ValidationError::combination(format!(
            "date_range_begin ({}) must not be after date_range_end ({})",
            begin, end
        )));
    }

    Ok((begin, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("d", "2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("d", "2023-02-29").is_err());
        assert!(parse_date("d", "2024-2-9").is_err());
        assert!(parse_date("d", "29.02.2024").is_err());
        assert!(parse_date("d", "").is_err());
    }

    #[test]
    fn test_last_n_days_bounds() {
        assert_eq!(validate_last_n_days("n", Some(1)).unwrap(), 1);
        assert_eq!(validate_last_n_days("n", Some(365)).unwrap(), 365);
        assert!(validate_last_n_days("n", Some(0)).is_err());
        assert!(validate_last_n_days("n", Some(366)).is_err());
        assert!(validate_last_n_days("n", Some(-4)).is_err());
        assert!(matches!(
            validate_last_n_days("n", None),
            Err(ValidationError::InvalidCombination { .. })
        ));
    }

    #[test]
    fn test_date_range() {
        let (begin, end) = validate_date_range(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert!(begin < end);

        // Single-day ranges are allowed
        assert!(validate_date_range(Some("2024-01-01"), Some("2024-01-01")).is_ok());

        assert!(validate_date_range(Some("2024-02-01"), Some("2024-01-01")).is_err());
        assert!(validate_date_range(Some("2024-02-01"), None).is_err());

        let err = validate_date_range(Some("2024-02-01"), Some("tomorrow")).unwrap_err();
        assert_eq!(err.field(), Some("date_range_end"));
    }
}
