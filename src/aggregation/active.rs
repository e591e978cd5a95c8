//! Active-student resolution.
//!
//! A student is active in a year when at least one of their accepted
//! enrollments is dated in that year.

use chrono::{DateTime, Datelike, Utc};
use std::collections::HashSet;
use tracing::debug;

use super::fields::{ENROLLMENT_DATE, STUDENT_ID};
use crate::models::RawRecord;

/// Distinct students with an accepted enrollment in the calendar year of `now`.
pub fn active_students(enrollments: &[RawRecord], now: DateTime<Utc>) -> usize {
    active_students_in_year(enrollments, now.year())
}

/// Distinct students with an accepted enrollment dated in `year`.
pub fn active_students_in_year(enrollments: &[RawRecord], year: i32) -> usize {
    let mut students = HashSet::new();
    let mut undated = 0usize;
    let mut anonymous = 0usize;

    for enrollment in enrollments {
        if !enrollment.has_status("accepted") {
            continue;
        }

        let Some(enrolled) = ENROLLMENT_DATE.resolve(enrollment) else {
            undated += 1;
            continue;
        };
        if enrolled.year() != year {
            continue;
        }

        match STUDENT_ID.resolve(enrollment) {
            Some(student) => {
                students.insert(student);
            }
            None => anonymous += 1,
        }
    }

    if undated > 0 || anonymous > 0 {
        debug!(
            "Skipped {} undated and {} unattributed accepted enrollments",
            undated, anonymous
        );
    }

    students.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn enrollment(value: serde_json::Value) -> RawRecord {
        RawRecord::new(value)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_counts_each_student_once() {
        let enrollments = vec![
            enrollment(json!({"student_id": 1, "status": "accepted", "enrolled_at": "2026-02-01"})),
            enrollment(json!({"student_id": 1, "status": "Accepted", "created_at": "2026-09-15"})),
            enrollment(json!({"student_id": 2, "status": "ACCEPTED", "date": "2026-01-20"})),
        ];

        assert_eq!(active_students(&enrollments, now()), 2);
    }

    #[test]
    fn test_skips_other_statuses() {
        let enrollments = vec![
            enrollment(json!({"student_id": 1, "status": "pending", "enrolled_at": "2026-02-01"})),
            enrollment(json!({"student_id": 2, "status": "rejected", "enrolled_at": "2026-02-01"})),
            enrollment(json!({"student_id": 3, "enrolled_at": "2026-02-01"})),
        ];

        assert_eq!(active_students(&enrollments, now()), 0);
    }

    #[test]
    fn test_excludes_other_years_and_undated() {
        let enrollments = vec![
            enrollment(json!({"student_id": 1, "status": "accepted", "enrolled_at": "2025-12-31"})),
            enrollment(json!({"student_id": 2, "status": "accepted", "enrolled_at": "bogus"})),
            enrollment(json!({"student_id": 3, "status": "accepted"})),
            enrollment(json!({"student_id": 4, "status": "accepted", "updated_at": "2026-03-01T09:00:00Z"})),
        ];

        assert_eq!(active_students(&enrollments, now()), 1);
    }

    #[test]
    fn test_skips_enrollments_without_student() {
        let enrollments = vec![
            enrollment(json!({"status": "accepted", "enrolled_at": "2026-02-01"})),
            enrollment(json!({"student": {"id": "S-9"}, "status": "accepted", "enrolled_at": "2026-02-01"})),
        ];

        assert_eq!(active_students(&enrollments, now()), 1);
    }

    #[test]
    fn test_year_rolls_with_clock() {
        let enrollments = vec![enrollment(
            json!({"student_id": 5, "status": "accepted", "enrolled_at": "2025-06-01"}),
        )];

        assert_eq!(active_students(&enrollments, now()), 0);
        assert_eq!(active_students_in_year(&enrollments, 2025), 1);
    }
}
