use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use health_risk_engine::feedback::{apply_feedback, FeedbackEvent};
use health_risk_engine::models::Observation;
use health_risk_engine::warnings::scan_risk_factors;
use health_risk_engine::{EngineConfig, HealthEngine};

mod db;
mod report;

#[derive(Parser)]
#[command(name = "health-risk")]
#[command(
    about = "Symptom risk, correlation and early-warning analysis over daily health logs",
    long_about = None
)]
struct Cli {
    /// Engine config file (TOML); falls back to HEALTH_RISK_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load six weeks of realistic seed data
    Seed,
    /// Import observations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Fit per-symptom models and show in-sample metrics
    Train {
        #[arg(long, default_value_t = 365)]
        since_days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Predict symptom risk for one observed day
    Predict {
        #[arg(long)]
        symptom: String,
        /// Day to score; defaults to the latest observation
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = 1)]
        horizon_days: u32,
        #[arg(long, default_value_t = 365)]
        since_days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Correlate habits with symptoms
    Correlations {
        #[arg(long, default_value_t = 365)]
        since_days: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Decompose and forecast one symptom
    Forecast {
        #[arg(long)]
        symptom: String,
        #[arg(long, default_value_t = 365)]
        since_days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Generate ranked early warnings
    Warnings {
        #[arg(long, default_value_t = 365)]
        since_days: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value_t = 365)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Record whether a recommendation helped
    #[command(group(
        ArgGroup::new("verdict")
            .args(["helpful", "not_helpful"])
            .required(true)
            .multiple(false)
    ))]
    Feedback {
        #[arg(long)]
        recommendation: String,
        #[arg(long)]
        helpful: bool,
        #[arg(long)]
        not_helpful: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("health_risk_engine=info,health_risk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config =
        EngineConfig::resolve(cli.config.as_deref()).context("failed to load engine config")?;

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let mut engine = HealthEngine::new(config);

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} seed observations.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} observations from {}.", csv.display());
        }
        Commands::Train { since_days, json } => {
            let observations = load(&pool, since_days).await?;
            let estimator = engine.train(&observations);
            if json {
                return print_json(estimator.reports());
            }

            println!(
                "Model fit over {} observations (in-sample, not cross-validated):",
                observations.len()
            );
            for report in estimator.reports() {
                match &report.message {
                    Some(message) => println!("- {}: {}", report.symptom, message),
                    None => println!(
                        "- {}: accuracy {:.2}, precision {:.2}, recall {:.2}, \
                         F1 {:.2} across {} trees",
                        report.symptom,
                        report.metrics.accuracy,
                        report.metrics.precision,
                        report.metrics.recall,
                        report.metrics.f1,
                        report.tree_count
                    ),
                }
            }
        }
        Commands::Predict {
            symptom,
            date,
            horizon_days,
            since_days,
            json,
        } => {
            let observations = load(&pool, since_days).await?;
            let Some(observation) = pick_observation(&observations, date) else {
                println!("No observation found to score.");
                return Ok(());
            };
            let estimator = engine.train(&observations);
            let prediction = estimator.predict(observation, &symptom, horizon_days);
            if json {
                return print_json(&prediction);
            }

            println!(
                "{} risk for {} (+{} days): {:.0}% ({} confidence)",
                prediction.symptom,
                observation.observed_on,
                prediction.horizon_days,
                prediction.probability,
                prediction.confidence.as_str()
            );
            if let Some(message) = &prediction.message {
                println!("Note: {message}");
            }
            for factor in &prediction.factors {
                println!("- {} ({:+.2}): {}", factor.name, factor.impact, factor.description);
            }
            println!("{}", prediction.recommendation);
        }
        Commands::Correlations {
            since_days,
            limit,
            json,
        } => {
            let observations = load(&pool, since_days).await?;
            let analysis = engine.analyze_correlations(&observations);
            if json {
                return print_json(&analysis);
            }
            if let Some(message) = &analysis.message {
                println!("{message}");
                return Ok(());
            }

            println!("Strongest habit/symptom correlations:");
            for result in analysis.correlations.iter().take(limit) {
                println!(
                    "- {} vs {}: {:+.2} via {:?} ({:?}, p ≈ {}, {} confidence)",
                    result.factor_a,
                    result.factor_b,
                    result.coefficient,
                    result.estimator,
                    result.strength,
                    result.p_value,
                    result.confidence.as_str()
                );
            }
            for insight in &analysis.insights {
                println!("* {insight}");
            }
        }
        Commands::Forecast {
            symptom,
            since_days,
            json,
        } => {
            let observations = load(&pool, since_days).await?;
            let forecast = engine.forecast(&observations, &symptom);
            if json {
                return print_json(&forecast);
            }
            if let Some(message) = &forecast.message {
                println!("{message}");
                return Ok(());
            }

            println!(
                "{} trend: {:?} ({:?}, {:+.0}%)",
                forecast.symptom,
                forecast.trend.direction,
                forecast.trend.strength,
                forecast.trend.relative_change * 100.0
            );
            for point in &forecast.points {
                println!(
                    "- {}: {:.0} (confidence {:.0}%) {}",
                    point.date,
                    point.predicted_value,
                    point.confidence * 100.0,
                    point.contributing_factors.join("; ")
                );
            }
        }
        Commands::Warnings {
            since_days,
            limit,
            json,
        } => {
            let observations = load(&pool, since_days).await?;
            let warnings = engine.generate_warnings(&observations);
            if json {
                return print_json(&warnings);
            }
            if warnings.is_empty() {
                println!("No warnings for the coming days.");
                return Ok(());
            }

            println!("Early warnings:");
            for warning in warnings.iter().take(limit) {
                println!(
                    "- {} ({}) {}: {:.0}%",
                    warning.symptom,
                    warning.severity.as_str(),
                    warning.timeframe,
                    warning.probability
                );
            }
        }
        Commands::Report { since_days, out } => {
            let since = cutoff_date(since_days);
            let observations = db::fetch_observations(&pool, since).await?;
            let estimator = engine.train(&observations);
            let correlations = engine.analyze_correlations(&observations);
            let symptom_names: Vec<String> = engine
                .config()
                .symptoms
                .iter()
                .map(|symptom| symptom.name.clone())
                .collect();
            let forecasts: Vec<_> = symptom_names
                .iter()
                .map(|name| engine.forecast(&observations, name))
                .collect();
            let warnings = engine.generate_warnings(&observations);
            let risk_factors = scan_risk_factors(&observations);

            let report = report::build_report(&report::ReportInput {
                since,
                observation_count: observations.len(),
                warnings: &warnings,
                forecasts: &forecasts,
                correlations: &correlations,
                training: estimator.reports(),
                risk_factors: &risk_factors,
            });
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Feedback {
            recommendation,
            helpful,
            not_helpful: _,
        } => {
            let event = if helpful {
                FeedbackEvent::Helpful
            } else {
                FeedbackEvent::NotHelpful
            };
            let current = db::fetch_feedback(&pool, &recommendation).await?;
            let updated = apply_feedback(current, event);
            db::save_feedback(&pool, &recommendation, &updated).await?;
            println!(
                "Recorded feedback: score {:.2} ({} helpful, {} not helpful).",
                updated.score, updated.helpful, updated.not_helpful
            );
        }
    }

    Ok(())
}

async fn load(pool: &PgPool, since_days: i64) -> anyhow::Result<Vec<Observation>> {
    db::fetch_observations(pool, cutoff_date(since_days)).await
}

fn cutoff_date(since_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(since_days.max(1))
}

fn pick_observation(observations: &[Observation], date: Option<NaiveDate>) -> Option<&Observation> {
    match date {
        Some(date) => observations
            .iter()
            .rev()
            .find(|observation| observation.observed_on == date),
        None => observations.iter().max_by_key(|observation| observation.observed_on),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
