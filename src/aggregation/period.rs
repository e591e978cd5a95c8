//! Reporting windows and the injectable clock.
//!
//! The current window is the calendar month containing a reference
//! instant; the comparable prior window is always derived from it, never
//! supplied separately.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, Utc};

/// Source of "now" for everything that depends on wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Half-open date interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    /// The calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
        Self { start, end }
    }

    /// The calendar month before this window's start.
    pub fn previous_month(&self) -> Self {
        let start = self
            .start
            .checked_sub_months(Months::new(1))
            .unwrap_or(self.start);
        Self::month_of(start)
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        date >= self.start && date < self.end
    }

    /// Last day inside the window.
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.start)
    }
}

/// Server-side scope for a record fetch, derived from a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodFilter {
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    pub year: i32,
    pub month: u32,
}

impl From<&PeriodWindow> for PeriodFilter {
    fn from(window: &PeriodWindow) -> Self {
        Self {
            start: window.start,
            end: window.last_day(),
            year: window.start.year(),
            month: window.start.month(),
        }
    }
}

/// Current window plus its comparable prior window, pinned to one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub reference: DateTime<Utc>,
    pub current: PeriodWindow,
    pub previous: PeriodWindow,
}

impl ReportingPeriod {
    pub fn containing(reference: DateTime<Utc>) -> Self {
        let current = PeriodWindow::month_of(reference.date_naive());
        Self {
            reference,
            current,
            previous: current.previous_month(),
        }
    }

    /// Calendar year of the reference instant.
    pub fn year(&self) -> i32 {
        self.reference.year()
    }
}
