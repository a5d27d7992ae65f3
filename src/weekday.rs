use chrono::{Datelike, NaiveDate};

use crate::models::{Sample, WeekdaySummary};

/// Day-of-week key used for grouping: 1 = Sunday .. 7 = Saturday.
pub fn weekday_identity(date: NaiveDate) -> u32 {
    date.weekday().number_from_sunday()
}

/// Groups items sharing a weekday, ordered by ascending weekday identity.
///
/// The sort is stable, so within a group items keep their input order and
/// the first element of each group is the first occurrence of that weekday
/// in `items`.
pub fn group_by_weekday<T, F>(items: &[T], date_of: F) -> Vec<Vec<&T>>
where
    F: Fn(&T) -> NaiveDate,
{
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by_key(|item| weekday_identity(date_of(*item)));

    sorted
        .chunk_by(|a, b| weekday_identity(date_of(*a)) == weekday_identity(date_of(*b)))
        .map(|run| run.to_vec())
        .collect()
}

pub fn average_by_weekday(samples: &[Sample]) -> Vec<WeekdaySummary> {
    let summaries: Vec<WeekdaySummary> = group_by_weekday(samples, |sample| sample.timestamp)
        .into_iter()
        .filter_map(|group| {
            let first = group.first()?;
            let values: Vec<f64> = group.iter().map(|sample| sample.value).collect();
            Some(WeekdaySummary {
                representative_date: first.timestamp,
                value: mean(&values),
            })
        })
        .collect();

    tracing::debug!(
        samples = samples.len(),
        weekdays = summaries.len(),
        "averaged samples by weekday"
    );
    summaries
}

/// First differences of a chronological series, each tagged with the later date.
pub fn daily_deltas(samples: &[Sample]) -> Vec<Sample> {
    samples
        .windows(2)
        .map(|pair| Sample::new(pair[1].timestamp, pair[1].value - pair[0].value))
        .collect()
}

/// Averages day-over-day changes per weekday.
///
/// `samples` must already be in ascending date order; nothing is re-sorted.
/// Fewer than two samples yield no summaries.
pub fn average_daily_deltas_by_weekday(samples: &[Sample]) -> Vec<WeekdaySummary> {
    if samples.len() < 2 {
        return Vec::new();
    }

    let deltas = daily_deltas(samples);
    tracing::debug!(samples = samples.len(), deltas = deltas.len(), "computed daily deltas");
    average_by_weekday(&deltas)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
