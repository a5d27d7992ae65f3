//! Failures surfaced by the health data store and sample entry.

use thiserror::Error;

use crate::models::MetricKind;

/// Each message is what the user sees when the operation fails.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("access to {0} data has not been requested yet")]
    AuthorizationNotDetermined(MetricKind),

    #[error("access to {0} data was denied; re-authorize it to continue")]
    AuthorizationDenied(MetricKind),

    #[error("no {0} data recorded for this period")]
    NoData(MetricKind),

    #[error("a window of {0} days is out of range")]
    InvalidWindow(i64),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("unable to complete request: {0}")]
    Store(#[from] sqlx::Error),

    #[error("unable to read samples: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HealthResult<T> = Result<T, HealthError>;

/// Parses a user-entered sample value.
pub fn parse_sample_value(text: &str) -> HealthResult<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(HealthError::InvalidValue("a value is required".into()));
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| HealthError::InvalidValue(format!("'{trimmed}' is not a number")))?;
    validate_sample_value(value)
}

pub fn validate_sample_value(value: f64) -> HealthResult<f64> {
    if !value.is_finite() {
        return Err(HealthError::InvalidValue(format!("{value} is not a finite number")));
    }
    if value < 0.0 {
        return Err(HealthError::InvalidValue(format!("{value} must not be negative")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_numbers() {
        assert_eq!(parse_sample_value(" 170.5 ").unwrap(), 170.5);
        assert_eq!(parse_sample_value("0").unwrap(), 0.0);
    }

    #[test]
    fn rejects_bad_input() {
        for text in ["", "   ", "abc", "-3", "NaN", "inf"] {
            assert!(
                matches!(parse_sample_value(text), Err(HealthError::InvalidValue(_))),
                "expected {text:?} to be rejected"
            );
        }
    }

    #[test]
    fn messages_name_the_metric() {
        let err = HealthError::AuthorizationDenied(MetricKind::Weight);
        assert_eq!(
            err.to_string(),
            "access to weight data was denied; re-authorize it to continue"
        );
        assert_eq!(
            HealthError::NoData(MetricKind::Steps).to_string(),
            "no steps data recorded for this period"
        );
    }
}
