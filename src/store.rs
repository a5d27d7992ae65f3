//! The health data store seen by the rest of the application.
//!
//! Stores answer range queries with exactly one sample per calendar day,
//! ascending by date, synthesising `0.0` for days without a measurement.
//! That is the shape the weekday aggregation expects.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::error::{validate_sample_value, HealthError, HealthResult};
use crate::models::{AuthorizationStatus, DateRange, MetricKind, Sample, WeekdaySummary};
use crate::weekday;

#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn authorization_status(&self, metric: MetricKind) -> HealthResult<AuthorizationStatus>;

    /// Records the user's answer for each metric.
    async fn request_authorization(&self, metrics: &[MetricKind], grant: bool) -> HealthResult<()>;

    async fn query_daily_samples(
        &self,
        metric: MetricKind,
        range: DateRange,
    ) -> HealthResult<Vec<Sample>>;

    async fn write_sample(&self, metric: MetricKind, date: NaiveDate, value: f64)
        -> HealthResult<()>;
}

pub fn ensure_authorized(metric: MetricKind, status: AuthorizationStatus) -> HealthResult<()> {
    match status {
        AuthorizationStatus::Authorized => Ok(()),
        AuthorizationStatus::Denied => Err(HealthError::AuthorizationDenied(metric)),
        AuthorizationStatus::NotDetermined => Err(HealthError::AuthorizationNotDetermined(metric)),
    }
}

/// Reduces raw readings to one value per day: summed for cumulative
/// metrics, averaged otherwise.
pub fn daily_values<I>(metric: MetricKind, readings: I) -> BTreeMap<NaiveDate, f64>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, value) in readings {
        let entry = by_day.entry(date).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    by_day
        .into_iter()
        .map(|(date, (total, count))| {
            let value = if metric.is_cumulative() {
                total
            } else {
                total / count as f64
            };
            (date, value)
        })
        .collect()
}

/// One sample per day of `range`; days missing from `values` become `0.0`.
pub fn fill_daily_gaps(range: DateRange, values: &BTreeMap<NaiveDate, f64>) -> Vec<Sample> {
    range
        .days()
        .map(|day| Sample::new(day, values.get(&day).copied().unwrap_or(0.0)))
        .collect()
}

/// Fetches `metric` for `range` and reduces it to weekday summaries.
///
/// With `deltas` set the summaries hold average day-over-day change.
pub async fn load_weekday_summaries(
    store: &dyn HealthStore,
    metric: MetricKind,
    range: DateRange,
    deltas: bool,
) -> HealthResult<Vec<WeekdaySummary>> {
    let samples = store.query_daily_samples(metric, range).await?;
    let summaries = if deltas {
        weekday::average_daily_deltas_by_weekday(&samples)
    } else {
        weekday::average_by_weekday(&samples)
    };
    Ok(summaries)
}

#[derive(Default)]
struct MemoryState {
    authorizations: HashMap<MetricKind, AuthorizationStatus>,
    readings: Vec<(MetricKind, NaiveDate, f64)>,
}

/// Store held entirely in process memory.
#[derive(Default)]
pub struct InMemoryHealthStore {
    state: RwLock<MemoryState>,
}

impl InMemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorizes every metric and loads `readings` without validation.
    pub async fn with_readings<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = (MetricKind, NaiveDate, f64)>,
    {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for metric in MetricKind::ALL {
                state
                    .authorizations
                    .insert(metric, AuthorizationStatus::Authorized);
            }
            state.readings.extend(readings);
        }
        store
    }
}

#[async_trait]
impl HealthStore for InMemoryHealthStore {
    async fn authorization_status(&self, metric: MetricKind) -> HealthResult<AuthorizationStatus> {
        let state = self.state.read().await;
        Ok(state
            .authorizations
            .get(&metric)
            .copied()
            .unwrap_or(AuthorizationStatus::NotDetermined))
    }

    async fn request_authorization(&self, metrics: &[MetricKind], grant: bool) -> HealthResult<()> {
        let status = if grant {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        let mut state = self.state.write().await;
        for metric in metrics {
            state.authorizations.insert(*metric, status);
        }
        Ok(())
    }

    async fn query_daily_samples(
        &self,
        metric: MetricKind,
        range: DateRange,
    ) -> HealthResult<Vec<Sample>> {
        ensure_authorized(metric, self.authorization_status(metric).await?)?;

        let state = self.state.read().await;
        let values = daily_values(
            metric,
            state
                .readings
                .iter()
                .filter(|(kind, date, _)| *kind == metric && range.contains(*date))
                .map(|(_, date, value)| (*date, *value)),
        );

        if values.is_empty() {
            return Err(HealthError::NoData(metric));
        }
        Ok(fill_daily_gaps(range, &values))
    }

    async fn write_sample(
        &self,
        metric: MetricKind,
        date: NaiveDate,
        value: f64,
    ) -> HealthResult<()> {
        ensure_authorized(metric, self.authorization_status(metric).await?)?;
        let value = validate_sample_value(value)?;

        self.state.write().await.readings.push((metric, date, value));
        tracing::info!(%metric, %date, value, "recorded sample");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_values_sum_steps_and_average_weight() {
        let readings = vec![
            (date(2025, 6, 9), 4000.0),
            (date(2025, 6, 9), 2500.0),
            (date(2025, 6, 10), 3000.0),
        ];
        let steps = daily_values(MetricKind::Steps, readings.clone());
        assert_eq!(steps[&date(2025, 6, 9)], 6500.0);

        let weight = daily_values(MetricKind::Weight, readings);
        assert_eq!(weight[&date(2025, 6, 9)], 3250.0);
        assert_eq!(weight[&date(2025, 6, 10)], 3000.0);
    }

    #[test]
    fn gaps_are_filled_with_zero() {
        let range = DateRange::last_days(date(2025, 6, 12), 4).unwrap();
        let values = BTreeMap::from([(date(2025, 6, 10), 5.0)]);
        let samples = fill_daily_gaps(range, &values);

        let flat: Vec<(NaiveDate, f64)> = samples.iter().map(|s| (s.timestamp, s.value)).collect();
        assert_eq!(
            flat,
            vec![
                (date(2025, 6, 9), 0.0),
                (date(2025, 6, 10), 5.0),
                (date(2025, 6, 11), 0.0),
                (date(2025, 6, 12), 0.0),
            ]
        );
    }

    #[tokio::test]
    async fn queries_require_authorization() {
        let store = InMemoryHealthStore::new();
        let range = DateRange::last_days(date(2025, 6, 12), 7).unwrap();

        let err = store
            .query_daily_samples(MetricKind::Steps, range)
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::AuthorizationNotDetermined(MetricKind::Steps)));

        store
            .request_authorization(&[MetricKind::Steps], false)
            .await
            .unwrap();
        let err = store
            .write_sample(MetricKind::Steps, date(2025, 6, 12), 10.0)
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::AuthorizationDenied(MetricKind::Steps)));
    }

    #[tokio::test]
    async fn empty_range_reports_no_data() {
        let store = InMemoryHealthStore::with_readings(std::iter::empty()).await;
        let range = DateRange::last_days(date(2025, 6, 12), 7).unwrap();
        let err = store
            .query_daily_samples(MetricKind::Weight, range)
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::NoData(MetricKind::Weight)));
    }

    #[tokio::test]
    async fn written_samples_come_back_daily() {
        let store = InMemoryHealthStore::new();
        store
            .request_authorization(&[MetricKind::Weight], true)
            .await
            .unwrap();
        store
            .write_sample(MetricKind::Weight, date(2025, 6, 9), 170.0)
            .await
            .unwrap();
        store
            .write_sample(MetricKind::Weight, date(2025, 6, 10), 169.0)
            .await
            .unwrap();
        assert!(store
            .write_sample(MetricKind::Weight, date(2025, 6, 10), -1.0)
            .await
            .is_err());

        let range = DateRange::last_days(date(2025, 6, 10), 2).unwrap();
        let samples = store
            .query_daily_samples(MetricKind::Weight, range)
            .await
            .unwrap();
        assert_eq!(
            samples,
            vec![
                Sample::new(date(2025, 6, 9), 170.0),
                Sample::new(date(2025, 6, 10), 169.0)
            ]
        );

        let deltas = load_weekday_summaries(&store, MetricKind::Weight, range, true)
            .await
            .unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].value, -1.0);
        assert_eq!(deltas[0].label(), "Tue");
    }
}
