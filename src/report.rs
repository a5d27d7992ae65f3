use std::fmt::Write;

use crate::models::{DateRange, MetricKind, WeekdaySummary};

const BAR_WIDTH: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Average,
    Change,
}

#[derive(Debug, Clone)]
pub struct ChartSection {
    pub title: String,
    pub metric: MetricKind,
    pub kind: ChartKind,
    pub summaries: Vec<WeekdaySummary>,
    /// Shown instead of the chart when the store could not supply data.
    pub unavailable: Option<String>,
}

fn format_value(metric: MetricKind, kind: ChartKind, value: f64) -> String {
    match (metric, kind) {
        (MetricKind::Steps, ChartKind::Average) => format!("{value:.0} {}", metric.unit()),
        (MetricKind::Steps, ChartKind::Change) => format!("{value:+.0} {}", metric.unit()),
        (MetricKind::Weight, ChartKind::Average) => format!("{value:.1} {}", metric.unit()),
        (MetricKind::Weight, ChartKind::Change) => format!("{value:+.2} {}", metric.unit()),
    }
}

fn bar(value: f64, scale: f64, kind: ChartKind) -> String {
    if scale <= 0.0 {
        return String::new();
    }
    let len = ((value.abs() / scale) * BAR_WIDTH).round() as usize;
    let glyph = match kind {
        ChartKind::Average => '#',
        ChartKind::Change if value < 0.0 => '-',
        ChartKind::Change => '+',
    };
    std::iter::repeat(glyph).take(len).collect()
}

/// One line per weekday: label, formatted value and a bar scaled to the
/// largest magnitude in the set.
pub fn render_summary_lines(
    metric: MetricKind,
    kind: ChartKind,
    summaries: &[WeekdaySummary],
) -> Vec<String> {
    let scale = summaries
        .iter()
        .map(|summary| summary.value.abs())
        .fold(0.0_f64, f64::max);

    summaries
        .iter()
        .map(|summary| {
            format!(
                "{} {:>14} {}",
                summary.label(),
                format_value(metric, kind, summary.value),
                bar(summary.value, scale, kind)
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

pub fn build_report(window: DateRange, sections: &[ChartSection]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekday Health Trends");
    let _ = writeln!(
        output,
        "Generated for {} through {} ({} days)",
        window.start,
        window.end,
        window.days().count()
    );

    for section in sections {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", section.title);

        if let Some(reason) = &section.unavailable {
            let _ = writeln!(output, "Unavailable: {reason}.");
            continue;
        }
        if section.summaries.is_empty() {
            let _ = writeln!(output, "No data recorded for this window.");
            continue;
        }

        let _ = writeln!(output, "```");
        for line in render_summary_lines(section.metric, section.kind, &section.summaries) {
            let _ = writeln!(output, "{line}");
        }
        let _ = writeln!(output, "```");

        // Averages highlight the highest day; changes the largest move either way.
        let (label, highlight): (&str, fn(&WeekdaySummary) -> f64) = match section.kind {
            ChartKind::Average => ("Highest day", |summary| summary.value),
            ChartKind::Change => ("Largest change", |summary| summary.value.abs()),
        };
        if let Some(best) = section.summaries.iter().max_by(|a, b| {
            highlight(a)
                .partial_cmp(&highlight(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        }) {
            let _ = writeln!(
                output,
                "{label}: {} ({})",
                best.label(),
                format_value(section.metric, section.kind, best.value)
            );
        }
    }

    output
}
