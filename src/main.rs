use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use health_weekday_trends::config::Config;
use health_weekday_trends::db::{self, PgHealthStore};
use health_weekday_trends::error::parse_sample_value;
use health_weekday_trends::report::{self, ChartKind, ChartSection};
use health_weekday_trends::store::{load_weekday_summaries, HealthStore, InMemoryHealthStore};
use health_weekday_trends::models::MAX_WINDOW_DAYS;
use health_weekday_trends::{DateRange, HealthError, MetricKind, WeekdaySummary};

#[derive(Parser)]
#[command(name = "health-trends")]
#[command(about = "Weekday step and weight trends from your health samples", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data and authorize both metrics
    Seed {
        #[arg(long, default_value_t = 28, value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_DAYS))]
        days: i64,
    },
    /// Import samples from a CSV file (date,metric,value[,source_key])
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Grant or deny access to metrics
    Authorize {
        #[arg(long, value_enum, required = true)]
        metric: Vec<MetricKind>,
        #[arg(long)]
        deny: bool,
    },
    /// Show authorization state per metric
    Status,
    /// Record a new sample
    Log {
        #[arg(long, value_enum)]
        metric: MetricKind,
        #[arg(long)]
        value: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print weekday averages for a metric
    Summary {
        #[arg(long, value_enum)]
        metric: MetricKind,
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_DAYS))]
        days: Option<i64>,
        /// Average day-over-day change instead of the value itself
        #[arg(long)]
        deltas: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_DAYS))]
        days: Option<i64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Run the weekday summaries against generated in-memory data
    Demo {
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_DAYS))]
        days: Option<i64>,
    },
}

fn init_tracing(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}

fn chart_kind(deltas: bool) -> ChartKind {
    if deltas {
        ChartKind::Change
    } else {
        ChartKind::Average
    }
}

fn print_summaries(
    metric: MetricKind,
    kind: ChartKind,
    summaries: &[WeekdaySummary],
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No {metric} data for this window.");
        return Ok(());
    }

    for line in report::render_summary_lines(metric, kind, summaries) {
        println!("{line}");
    }
    Ok(())
}

/// Missing data and denied access become report notes; store failures abort.
async fn chart_section(
    store: &dyn HealthStore,
    title: &str,
    metric: MetricKind,
    kind: ChartKind,
    window: DateRange,
) -> anyhow::Result<ChartSection> {
    let mut section = ChartSection {
        title: title.to_string(),
        metric,
        kind,
        summaries: Vec::new(),
        unavailable: None,
    };

    match load_weekday_summaries(store, metric, window, kind == ChartKind::Change).await {
        Ok(summaries) => section.summaries = summaries,
        Err(HealthError::NoData(_)) => {}
        Err(
            err @ (HealthError::AuthorizationDenied(_) | HealthError::AuthorizationNotDetermined(_)),
        ) => section.unavailable = Some(err.to_string()),
        Err(err) => return Err(err).context("failed to load report data"),
    }

    Ok(section)
}

async fn build_sections(
    store: &dyn HealthStore,
    window: DateRange,
) -> anyhow::Result<Vec<ChartSection>> {
    Ok(vec![
        chart_section(store, "Steps by weekday", MetricKind::Steps, ChartKind::Average, window)
            .await?,
        chart_section(store, "Weight by weekday", MetricKind::Weight, ChartKind::Average, window)
            .await?,
        chart_section(
            store,
            "Weight change by weekday",
            MetricKind::Weight,
            ChartKind::Change,
            window,
        )
        .await?,
    ])
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn connect_store(config: &Config) -> anyhow::Result<PgHealthStore> {
    Ok(PgHealthStore::new(connect(config).await?))
}

fn window_for(days: i64) -> anyhow::Result<DateRange> {
    db::window_ending_today(days).with_context(|| format!("invalid window of {days} days"))
}

async fn run_demo(days: i64) -> anyhow::Result<Vec<ChartSection>> {
    let readings = db::seed_readings(db::today(), days)
        .with_context(|| format!("invalid window of {days} days"))?;
    let store = InMemoryHealthStore::with_readings(
        readings
            .into_iter()
            .map(|(_, metric, date, value)| (metric, date, value)),
    )
    .await;

    build_sections(&store, window_for(days)?).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config.log_filter);

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect(&config).await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed { days } => {
            let store = connect_store(&config).await?;
            let inserted = db::seed(&store, db::today(), days).await?;
            println!("Seed data inserted ({inserted} new samples).");
        }
        Commands::Import { csv } => {
            let store = connect_store(&config).await?;
            let inserted = db::import_csv(&store, &csv).await?;
            println!("Inserted {inserted} samples from {}.", csv.display());
        }
        Commands::Authorize { metric, deny } => {
            let store = connect_store(&config).await?;
            store.request_authorization(&metric, !deny).await?;
            let verb = if deny { "Denied" } else { "Authorized" };
            let names: Vec<&str> = metric.iter().map(|m| m.as_str()).collect();
            println!("{verb} access to {}.", names.join(", "));
        }
        Commands::Status => {
            let store = connect_store(&config).await?;
            for metric in MetricKind::ALL {
                let status = store.authorization_status(metric).await?;
                println!("- {metric}: {}", status.as_str());
            }
        }
        Commands::Log {
            metric,
            value,
            date,
        } => {
            let value = parse_sample_value(&value)?;
            let date = date.unwrap_or_else(db::today);
            let store = connect_store(&config).await?;
            store.write_sample(metric, date, value).await?;
            println!("Recorded {value} {} for {date}.", metric.unit());
        }
        Commands::Summary {
            metric,
            days,
            deltas,
            json,
        } => {
            let window = window_for(days.unwrap_or(config.window_days))?;
            let store = connect_store(&config).await?;
            let summaries = match load_weekday_summaries(&store, metric, window, deltas).await {
                Ok(summaries) => summaries,
                Err(HealthError::NoData(_)) => Vec::new(),
                Err(err) => return Err(err.into()),
            };
            print_summaries(metric, chart_kind(deltas), &summaries, json)?;
        }
        Commands::Report { days, out } => {
            let window = window_for(days.unwrap_or(config.window_days))?;
            let store = connect_store(&config).await?;
            let sections = build_sections(&store, window).await?;
            let report = report::build_report(window, &sections);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Demo { days } => {
            for section in run_demo(days.unwrap_or(config.window_days)).await? {
                println!("{}", section.title);
                print_summaries(section.metric, section.kind, &section.summaries, false)?;
                println!();
            }
        }
    }

    Ok(())
}
