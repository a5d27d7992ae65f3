//! Weekday step and weight trends over a personal health sample store.
//!
//! [`weekday`] holds the pure aggregation; [`store`] and [`db`] supply the
//! daily samples it consumes.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod store;
pub mod weekday;

pub use error::{HealthError, HealthResult};
pub use models::{AuthorizationStatus, DateRange, MetricKind, Sample, WeekdaySummary};
pub use weekday::{average_by_weekday, average_daily_deltas_by_weekday, group_by_weekday, mean};
