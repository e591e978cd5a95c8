//! Pure computations behind the dashboard: bucketing, profit, active
//! students and trends.

pub mod active;
pub mod bucket;
pub mod fields;
pub mod period;
pub mod trend;

pub use active::{active_students, active_students_in_year};
pub use bucket::{PeriodTotals, Windowing};
pub use period::{Clock, FixedClock, PeriodFilter, ReportingPeriod, SystemClock};
pub use trend::build_trends;
