//! Field lookup for records with an inconsistent schema.
//!
//! A [`FieldLookup`] is an ordered list of field names plus a parser. The first
//! field that is present and parses wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::models::RawRecord;

/// Ordered "first successful extractor wins" lookup.
pub struct FieldLookup<T> {
    fields: &'static [&'static str],
    parse: fn(&Value) -> Option<T>,
}

impl<T> FieldLookup<T> {
    pub const fn new(fields: &'static [&'static str], parse: fn(&Value) -> Option<T>) -> Self {
        Self { fields, parse }
    }

    /// Value of the first field that parses.
    pub fn resolve(&self, record: &RawRecord) -> Option<T> {
        self.resolve_named(record).map(|(_, value)| value)
    }

    /// Like [`FieldLookup::resolve`], also returning which field matched.
    pub fn resolve_named(&self, record: &RawRecord) -> Option<(&'static str, T)> {
        self.fields.iter().find_map(|field| {
            record
                .field(field)
                .and_then(self.parse)
                .map(|value| (*field, value))
        })
    }
}

pub static ENROLLMENT_DATE: FieldLookup<NaiveDateTime> = FieldLookup::new(
    &[
        "enrolled_at",
        "enrolledAt",
        "enrollment_date",
        "created_at",
        "createdAt",
        "date",
        "updated_at",
        "updatedAt",
    ],
    parse_timestamp,
);

pub static PAYMENT_DATE: FieldLookup<NaiveDateTime> = FieldLookup::new(
    &[
        "payment_date",
        "paymentDate",
        "paid_at",
        "created_at",
        "createdAt",
        "date",
        "updated_at",
        "updatedAt",
    ],
    parse_timestamp,
);

pub static EXPENSE_DATE: FieldLookup<NaiveDateTime> = FieldLookup::new(
    &[
        "expense_date",
        "expenseDate",
        "created_at",
        "createdAt",
        "date",
        "updated_at",
        "updatedAt",
    ],
    parse_timestamp,
);

pub static STUDENT_ID: FieldLookup<String> = FieldLookup::new(
    &["student_id", "studentId", "student.id", "user_id"],
    parse_identifier,
);

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp from an RFC 3339 string, a naive date-time, a bare date
/// or a unix epoch number (seconds or milliseconds). Offsets are normalised
/// to UTC.
pub fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => {
            let epoch = n.as_i64()?;
            // Anything past 1e11 cannot be seconds within a sane date range.
            let parsed = if epoch.abs() >= 100_000_000_000 {
                DateTime::from_timestamp_millis(epoch)
            } else {
                DateTime::from_timestamp(epoch, 0)
            };
            parsed.map(|dt| dt.naive_utc())
        }
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Non-empty string or integer identifier.
pub fn parse_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp(&json!("2026-03-05T10:00:00Z")), Some(at(2026, 3, 5, 10)));
        assert_eq!(
            parse_timestamp(&json!("2026-03-05T13:00:00+03:00")),
            Some(at(2026, 3, 5, 10))
        );
        assert_eq!(
            parse_timestamp(&json!("2026-03-05 10:00:00")),
            Some(at(2026, 3, 5, 10))
        );
        assert_eq!(
            parse_timestamp(&json!("2026-03-05T10:00:00.000000")),
            Some(at(2026, 3, 5, 10))
        );
        assert_eq!(parse_timestamp(&json!("2026-03-05")), Some(at(2026, 3, 5, 0)));
        assert_eq!(parse_timestamp(&json!(1_772_704_800)), Some(at(2026, 3, 5, 10)));
        assert_eq!(parse_timestamp(&json!(1_772_704_800_000i64)), Some(at(2026, 3, 5, 10)));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(&json!("not a date")), None);
        assert_eq!(parse_timestamp(&json!("2026-13-45")), None);
        assert_eq!(parse_timestamp(&json!("")), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn test_lookup_takes_first_parseable_field() {
        let record = RawRecord::new(json!({
            "enrolled_at": "garbage",
            "created_at": "2025-11-02",
            "updated_at": "2026-01-01"
        }));

        let (field, value) = ENROLLMENT_DATE.resolve_named(&record).unwrap();
        assert_eq!(field, "created_at");
        assert_eq!(value, at(2025, 11, 2, 0));
    }

    #[test]
    fn test_lookup_none_when_nothing_parses() {
        let record = RawRecord::new(json!({"date": "soon", "note": "2026-01-01"}));
        assert!(ENROLLMENT_DATE.resolve(&record).is_none());
    }

    #[test]
    fn test_student_id_lookup() {
        let nested = RawRecord::new(json!({"student": {"id": 7}}));
        assert_eq!(STUDENT_ID.resolve(&nested).as_deref(), Some("7"));

        let camel = RawRecord::new(json!({"student_id": "  ", "studentId": "S-1"}));
        assert_eq!(STUDENT_ID.resolve(&camel).as_deref(), Some("S-1"));

        let none = RawRecord::new(json!({"student": null}));
        assert!(STUDENT_ID.resolve(&none).is_none());
    }
}
