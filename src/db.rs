use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use health_risk_engine::feedback::EffectivenessStats;
use health_risk_engine::models::{ExerciseIntensity, Observation};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn insert_observation(
    pool: &PgPool,
    observation: &Observation,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO health_risk.observations
        (id, observed_on, sleep_hours, stress_level, caffeine, exercise, exercise_intensity,
         recovery_score, water_intake, meal_count, symptoms, severity, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(observation.observed_on)
    .bind(observation.sleep_hours)
    .bind(observation.stress_level)
    .bind(observation.caffeine)
    .bind(observation.exercise)
    .bind(observation.exercise_intensity.map(|intensity| intensity.as_str()))
    .bind(observation.recovery_score)
    .bind(observation.water_intake)
    .bind(observation.meal_count)
    .bind(observation.symptoms.as_slice())
    .bind(observation.severity)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Six weeks ending today: short, caffeinated nights on a four-day rhythm
/// with reflux or headaches the day after, plus a mid-week stress bump.
pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let today = Utc::now().date_naive();
    let mut inserted = 0usize;

    for offset in (0..42).rev() {
        let observed_on = today - Duration::days(offset);
        let index = 41 - offset;
        let mut observation = Observation::baseline(observed_on);

        if index % 4 == 0 {
            observation.sleep_hours = 5.0 + (index % 3) as f64 * 0.3;
            observation.caffeine = true;
            observation.stress_level = 8;
        } else {
            observation.sleep_hours = 7.0 + (index % 5) as f64 * 0.25;
            observation.caffeine = index % 3 == 0;
        }
        if index % 4 == 1 {
            observation.symptoms = vec!["reflux after dinner".to_string()];
            observation.severity = 4;
        }
        if index % 7 == 2 {
            observation.stress_level = 9;
            observation.symptoms.push("tension headache".to_string());
            observation.severity = observation.severity.max(3);
        }
        if index % 2 == 0 {
            observation.exercise = true;
            observation.exercise_intensity = Some(if index % 6 == 0 {
                ExerciseIntensity::High
            } else {
                ExerciseIntensity::Medium
            });
            observation.recovery_score = 7;
        }
        observation.water_intake = 3.0 + (index % 4) as f64;
        observation.meal_count = if index % 5 == 0 { 2 } else { 3 };

        let source_key = format!("seed-{observed_on}");
        if insert_observation(pool, &observation, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn fetch_observations(
    pool: &PgPool,
    since_date: NaiveDate,
) -> anyhow::Result<Vec<Observation>> {
    let rows = sqlx::query(
        "SELECT observed_on, sleep_hours, stress_level, caffeine, exercise, exercise_intensity, \
         recovery_score, water_intake, meal_count, symptoms, severity \
         FROM health_risk.observations \
         WHERE observed_on >= $1 \
         ORDER BY observed_on ASC",
    )
    .bind(since_date)
    .fetch_all(pool)
    .await?;

    let mut observations = Vec::with_capacity(rows.len());
    for row in rows {
        let intensity: Option<String> = row.get("exercise_intensity");
        observations.push(Observation {
            observed_on: row.get("observed_on"),
            sleep_hours: row.get("sleep_hours"),
            stress_level: row.get("stress_level"),
            caffeine: row.get("caffeine"),
            exercise: row.get("exercise"),
            exercise_intensity: intensity.as_deref().and_then(ExerciseIntensity::parse),
            recovery_score: row.get("recovery_score"),
            water_intake: row.get("water_intake"),
            meal_count: row.get("meal_count"),
            symptoms: row.get("symptoms"),
            severity: row.get("severity"),
        });
    }

    Ok(observations)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        observed_on: NaiveDate,
        sleep_hours: f64,
        stress_level: i32,
        caffeine: bool,
        exercise: bool,
        exercise_intensity: Option<String>,
        recovery_score: i32,
        water_intake: f64,
        meal_count: i32,
        symptoms: Option<String>,
        severity: i32,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", line + 1))?;
        let exercise_intensity = match row.exercise_intensity.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(
                ExerciseIntensity::parse(value)
                    .with_context(|| format!("unknown exercise intensity '{value}'"))?,
            ),
        };
        let symptoms = row
            .symptoms
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|symptom| !symptom.is_empty())
            .map(str::to_string)
            .collect();

        let observation = Observation {
            observed_on: row.observed_on,
            sleep_hours: row.sleep_hours,
            stress_level: row.stress_level,
            caffeine: row.caffeine,
            exercise: row.exercise,
            exercise_intensity,
            recovery_score: row.recovery_score,
            water_intake: row.water_intake,
            meal_count: row.meal_count,
            symptoms,
            severity: row.severity,
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_observation(pool, &observation, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn fetch_feedback(
    pool: &PgPool,
    recommendation: &str,
) -> anyhow::Result<EffectivenessStats> {
    let row = sqlx::query(
        "SELECT helpful, not_helpful, score \
         FROM health_risk.recommendation_feedback \
         WHERE recommendation = $1",
    )
    .bind(recommendation)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some(row) => EffectivenessStats {
            helpful: row.get("helpful"),
            not_helpful: row.get("not_helpful"),
            score: row.get("score"),
        },
        None => EffectivenessStats::default(),
    })
}

pub async fn save_feedback(
    pool: &PgPool,
    recommendation: &str,
    stats: &EffectivenessStats,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO health_risk.recommendation_feedback
        (recommendation, helpful, not_helpful, score, updated_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (recommendation) DO UPDATE
        SET helpful = EXCLUDED.helpful,
            not_helpful = EXCLUDED.not_helpful,
            score = EXCLUDED.score,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(recommendation)
    .bind(stats.helpful)
    .bind(stats.not_helpful)
    .bind(stats.score)
    .execute(pool)
    .await?;

    Ok(())
}
