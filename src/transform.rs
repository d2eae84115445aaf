use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::instruction::{TransformKind, ValidationKind};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

/// Normalizes a raw profile value for the target field's semantic type.
pub fn transform(value: &str, kind: Option<TransformKind>) -> String {
    match kind {
        Some(TransformKind::Phone) => format_phone(value),
        Some(TransformKind::Date) => match parse_date(value) {
            Some(date) => date.format("%m/%d/%Y").to_string(),
            None => {
                warn!("Could not parse '{}' as a date, leaving it unchanged", value);
                value.to_string()
            }
        },
        Some(TransformKind::Identity) | None => value.to_string(),
    }
}

pub fn validate(value: &str, kind: Option<ValidationKind>) -> bool {
    match kind {
        Some(ValidationKind::Email) => EMAIL.is_match(value),
        Some(ValidationKind::Phone) => digits(value).len() == 10,
        Some(ValidationKind::Number) => value
            .trim()
            .parse::<f64>()
            .map(f64::is_finite)
            .unwrap_or(false),
        Some(ValidationKind::Any) | None => true,
    }
}

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn format_phone(value: &str) -> String {
    let d = digits(value);
    if d.len() != 10 {
        return value.to_string();
    }
    format!("({}) {}-{}", &d[0..3], &d[3..6], &d[6..10])
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Some(dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_formats_ten_digits() {
        assert_eq!(transform("5551234567", Some(TransformKind::Phone)), "(555) 123-4567");
        assert_eq!(transform("555.123.4567", Some(TransformKind::Phone)), "(555) 123-4567");
    }

    #[test]
    fn test_phone_passes_through_other_lengths() {
        assert_eq!(transform("+1 555 123 4567", Some(TransformKind::Phone)), "+1 555 123 4567");
        assert_eq!(transform("12345", Some(TransformKind::Phone)), "12345");
    }

    #[test]
    fn test_phone_transform_is_idempotent() {
        let once = transform("555-123-4567", Some(TransformKind::Phone));
        let twice = transform(&once, Some(TransformKind::Phone));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_date_formats() {
        let date = Some(TransformKind::Date);
        assert_eq!(transform("2004-03-05", date), "03/05/2004");
        assert_eq!(transform("2004-03-05T10:30:00Z", date), "03/05/2004");
        assert_eq!(transform("2004-03-05T10:30:00", date), "03/05/2004");
        assert_eq!(transform("3/5/2004", date), "03/05/2004");
        assert_eq!(transform("2004/12/31", date), "12/31/2004");
        assert_eq!(transform("March 5, 2004", date), "03/05/2004");
        assert_eq!(transform("Mar 5, 2004", date), "03/05/2004");
    }

    #[test]
    fn test_unparseable_date_passes_through() {
        assert_eq!(transform("sometime in spring", Some(TransformKind::Date)), "sometime in spring");
    }

    #[test]
    fn test_identity_transforms() {
        assert_eq!(transform("Ada", None), "Ada");
        assert_eq!(transform("Ada", Some(TransformKind::Identity)), "Ada");
    }

    #[test]
    fn test_email_validation() {
        let email = Some(ValidationKind::Email);
        assert!(!validate("not-an-email", email));
        assert!(validate("a@b.co", email));
        assert!(!validate("a b@c.co", email));
        assert!(!validate("a@b", email));
        assert!(!validate("a@@b.co", email));
    }

    #[test]
    fn test_phone_and_number_validation() {
        assert!(validate("(555) 123-4567", Some(ValidationKind::Phone)));
        assert!(!validate("555-1234", Some(ValidationKind::Phone)));
        assert!(validate("3.9", Some(ValidationKind::Number)));
        assert!(validate(" 1450 ", Some(ValidationKind::Number)));
        assert!(!validate("3.9 GPA", Some(ValidationKind::Number)));
        assert!(!validate("", Some(ValidationKind::Number)));
        assert!(!validate("NaN", Some(ValidationKind::Number)));
    }

    #[test]
    fn test_default_validation_accepts_anything() {
        assert!(validate("", None));
        assert!(validate("anything", Some(ValidationKind::Any)));
    }
}
