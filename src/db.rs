use std::path::Path;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{validate_sample_value, HealthError, HealthResult};
use crate::models::{AuthorizationStatus, DateRange, MetricKind, Sample};
use crate::store::{daily_values, ensure_authorized, fill_daily_gaps, HealthStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgHealthStore {
    pool: PgPool,
}

impl PgHealthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_sample(
        &self,
        metric: MetricKind,
        date: NaiveDate,
        value: f64,
        source_key: &str,
    ) -> HealthResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO health_trends.samples (id, metric, sample_date, value, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(metric.as_str())
        .bind(date)
        .bind(value)
        .bind(source_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HealthStore for PgHealthStore {
    async fn authorization_status(&self, metric: MetricKind) -> HealthResult<AuthorizationStatus> {
        let row = sqlx::query("SELECT status FROM health_trends.authorizations WHERE metric = $1")
            .bind(metric.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => AuthorizationStatus::parse(row.get::<String, _>("status").as_str()),
            None => AuthorizationStatus::NotDetermined,
        })
    }

    async fn request_authorization(&self, metrics: &[MetricKind], grant: bool) -> HealthResult<()> {
        let status = if grant {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };

        for metric in metrics {
            sqlx::query(
                r#"
                INSERT INTO health_trends.authorizations (metric, status)
                VALUES ($1, $2)
                ON CONFLICT (metric) DO UPDATE
                SET status = EXCLUDED.status, updated_at = now()
                "#,
            )
            .bind(metric.as_str())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
            tracing::info!(%metric, status = status.as_str(), "authorization updated");
        }

        Ok(())
    }

    async fn query_daily_samples(
        &self,
        metric: MetricKind,
        range: DateRange,
    ) -> HealthResult<Vec<Sample>> {
        ensure_authorized(metric, self.authorization_status(metric).await?)?;

        let rows = sqlx::query(
            r#"
            SELECT sample_date, value
            FROM health_trends.samples
            WHERE metric = $1 AND sample_date BETWEEN $2 AND $3
            ORDER BY sample_date
            "#,
        )
        .bind(metric.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        let values = daily_values(
            metric,
            rows.iter()
                .map(|row| (row.get::<NaiveDate, _>("sample_date"), row.get::<f64, _>("value"))),
        );
        tracing::debug!(%metric, rows = rows.len(), days = values.len(), "queried samples");

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

        self.insert_sample(metric, date, value, &format!("manual-{}", Uuid::new_v4()))
            .await?;
        tracing::info!(%metric, %date, value, "recorded sample");
        Ok(())
    }
}

/// Plausible daily readings ending at `end`, keyed for idempotent inserts.
pub fn seed_readings(
    end: NaiveDate,
    days: i64,
) -> HealthResult<Vec<(String, MetricKind, NaiveDate, f64)>> {
    const STEPS_BY_WEEKDAY: [f64; 7] = [4200.0, 8600.0, 9100.0, 7800.0, 9400.0, 6900.0, 5300.0];

    let range = DateRange::last_days(end, days)?;
    let mut readings = Vec::new();

    for (offset, date) in range.days().enumerate() {
        let weekday = date.weekday().num_days_from_sunday() as usize;
        let steps = STEPS_BY_WEEKDAY[weekday] + (offset % 3) as f64 * 250.0;
        readings.push((format!("seed-steps-{date}"), MetricKind::Steps, date, steps));

        // Weekend weigh-ins run a little high, then the week trends back down.
        let bump = if weekday == 0 || weekday == 6 { 0.8 } else { 0.0 };
        let weight = 172.0 - offset as f64 * 0.1 + bump;
        readings.push((
            format!("seed-weight-{date}"),
            MetricKind::Weight,
            date,
            (weight * 10.0).round() / 10.0,
        ));
    }

    Ok(readings)
}

pub async fn seed(store: &PgHealthStore, end: NaiveDate, days: i64) -> anyhow::Result<usize> {
    store
        .request_authorization(&MetricKind::ALL, true)
        .await?;

    let mut inserted = 0usize;
    for (source_key, metric, date, value) in seed_readings(end, days)? {
        if store.insert_sample(metric, date, value, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub metric: MetricKind,
    pub date: NaiveDate,
    pub value: f64,
    pub source_key: Option<String>,
}

/// Reads `date,metric,value[,source_key]` rows, skipping rows that cannot be
/// parsed or fail validation. Returns the usable rows and the number skipped.
/// Only I/O failures abort the import.
pub fn read_import_rows<R: std::io::Read>(reader: R) -> HealthResult<(Vec<ImportRow>, usize)> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        date: NaiveDate,
        metric: String,
        value: f64,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                tracing::warn!(line = line + 2, error = %err, "skipping unreadable csv row");
                skipped += 1;
                continue;
            }
        };
        let parsed = row
            .metric
            .parse::<MetricKind>()
            .map_err(HealthError::InvalidValue)
            .and_then(|metric| Ok((metric, validate_sample_value(row.value)?)));

        match parsed {
            Ok((metric, value)) => rows.push(ImportRow {
                metric,
                date: row.date,
                value,
                source_key: row.source_key.filter(|key| !key.trim().is_empty()),
            }),
            Err(err) => {
                tracing::warn!(line = line + 2, error = %err, "skipping csv row");
                skipped += 1;
            }
        }
    }

    Ok((rows, skipped))
}

pub async fn import_csv(store: &PgHealthStore, csv_path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)?;
    let (rows, skipped) = read_import_rows(file)?;
    let mut inserted = 0usize;

    for row in rows {
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if store
            .insert_sample(row.metric, row.date, row.value, &source_key)
            .await?
        {
            inserted += 1;
        }
    }

    tracing::info!(inserted, skipped, path = %csv_path.display(), "csv import finished");
    Ok(inserted)
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Most recent `days` days ending today.
pub fn window_ending_today(days: i64) -> HealthResult<DateRange> {
    DateRange::last_days(today(), days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn seed_covers_every_day_for_both_metrics() {
        let readings = seed_readings(date(2025, 6, 28), 28).unwrap();
        assert_eq!(readings.len(), 56);

        let mut keys: Vec<&str> = readings.iter().map(|r| r.0.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 56);
        assert!(readings.iter().all(|r| r.3 > 0.0));
    }

    #[test]
    fn import_skips_invalid_rows() {
        let data = "date,metric,value,source_key\n\
                    2025-06-09,steps,8123,fitbit-1\n\
                    2025-06-09,weight,170.4,\n\
                    2025-06-10,calories,300,\n\
                    2025-06-10,weight,-2,\n";
        let (rows, skipped) = read_import_rows(data.as_bytes()).unwrap();

        assert_eq!(skipped, 2);
        assert_eq!(
            rows,
            vec![
                ImportRow {
                    metric: MetricKind::Steps,
                    date: date(2025, 6, 9),
                    value: 8123.0,
                    source_key: Some("fitbit-1".into()),
                },
                ImportRow {
                    metric: MetricKind::Weight,
                    date: date(2025, 6, 9),
                    value: 170.4,
                    source_key: None,
                },
            ]
        );
    }

    #[test]
    fn import_skips_unparsable_rows() {
        let data = "date,metric,value,source_key\n\
                    2025-06-31,steps,8123,\n\
                    2025-06-10,weight,heavy,\n\
                    2025-06-11,weight,169.8,scale-7\n";
        let (rows, skipped) = read_import_rows(data.as_bytes()).unwrap();

        assert_eq!(skipped, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date(2025, 6, 11));
    }

    #[test]
    fn seed_rejects_oversized_window() {
        assert!(matches!(
            seed_readings(date(2025, 6, 28), 1_000_000_000),
            Err(HealthError::InvalidWindow(_))
        ));
    }

    #[test]
    fn import_reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,metric,value,source_key").unwrap();
        writeln!(file, "2025-06-11,weight,169.8,scale-7").unwrap();

        let reader = std::fs::File::open(file.path()).unwrap();
        let (rows, skipped) = read_import_rows(reader).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(rows[0].source_key.as_deref(), Some("scale-7"));
    }

    #[test]
    fn window_ending_today_spans_requested_days() {
        let range = window_ending_today(28).unwrap();
        assert_eq!(range.days().count(), 28);
        assert_eq!(range.end, today());
    }
}
