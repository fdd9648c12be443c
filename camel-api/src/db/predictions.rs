//! Prediction record persistence
//!
//! Records are insert-only: they are read back (owner-scoped) and eventually
//! hard-deleted, never updated.

use camel_common::{Error, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{format_timestamp, parse_timestamp};
use crate::models::{NewPrediction, PredictionRecord, PredictionSummary, Probabilities, TraitScores};

/// Persist a prediction in a single atomic insert
pub async fn insert_prediction(pool: &SqlitePool, new: NewPrediction) -> Result<PredictionRecord> {
    // Prepare all data before touching the pool
    let probabilities = serde_json::to_string(&new.probabilities)
        .map_err(|e| Error::Internal(format!("Failed to serialize probabilities: {}", e)))?;
    let created_at = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO predictions (
            user_id, breed, confidence, rating,
            head_size, leg_condition, coat_quality, overall_fitness,
            is_fallback, explanation_png, probabilities, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.user_id)
    .bind(&new.breed)
    .bind(new.confidence)
    .bind(new.rating)
    .bind(new.traits.head_size)
    .bind(new.traits.leg_condition)
    .bind(new.traits.coat_quality)
    .bind(new.traits.overall_fitness)
    .bind(new.is_fallback)
    .bind(&new.explanation_png)
    .bind(&probabilities)
    .bind(format_timestamp(created_at))
    .execute(pool)
    .await?;

    Ok(PredictionRecord {
        id: result.last_insert_rowid(),
        user_id: new.user_id,
        breed: new.breed,
        confidence: new.confidence,
        rating: new.rating,
        traits: new.traits,
        is_fallback: new.is_fallback,
        explanation_png: new.explanation_png,
        probabilities: new.probabilities,
        created_at,
    })
}

/// One page of a user's history, newest first
pub async fn list_predictions(
    pool: &SqlitePool,
    user_id: i64,
    offset: i64,
    limit: i64,
) -> Result<Vec<PredictionSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, breed, confidence, rating, is_fallback, probabilities, created_at
        FROM predictions
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

/// Fetch one record, only if it belongs to `user_id`
pub async fn get_prediction(
    pool: &SqlitePool,
    user_id: i64,
    prediction_id: i64,
) -> Result<Option<PredictionRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, breed, confidence, rating,
               head_size, leg_condition, coat_quality, overall_fitness,
               is_fallback, explanation_png, probabilities, created_at
        FROM predictions
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(prediction_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Hard-delete one record owned by `user_id`
///
/// Returns `false` when no such record exists for this owner.
pub async fn delete_prediction(pool: &SqlitePool, user_id: i64, prediction_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM predictions WHERE id = ? AND user_id = ?")
        .bind(prediction_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of records owned by `user_id`
pub async fn count_predictions(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn parse_probabilities(text: &str) -> Result<Probabilities> {
    serde_json::from_str(text)
        .map_err(|e| Error::Internal(format!("Invalid stored probabilities: {}", e)))
}

fn summary_from_row(row: &SqliteRow) -> Result<PredictionSummary> {
    let probabilities: String = row.try_get("probabilities")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(PredictionSummary {
        id: row.try_get("id")?,
        breed: row.try_get("breed")?,
        confidence: row.try_get("confidence")?,
        rating: row.try_get("rating")?,
        is_fallback: row.try_get("is_fallback")?,
        probabilities: parse_probabilities(&probabilities)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<PredictionRecord> {
    let probabilities: String = row.try_get("probabilities")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(PredictionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        breed: row.try_get("breed")?,
        confidence: row.try_get("confidence")?,
        rating: row.try_get("rating")?,
        traits: TraitScores::new(
            row.try_get("head_size")?,
            row.try_get("leg_condition")?,
            row.try_get("coat_quality")?,
            row.try_get("overall_fitness")?,
        ),
        is_fallback: row.try_get("is_fallback")?,
        explanation_png: row.try_get("explanation_png")?,
        probabilities: parse_probabilities(&probabilities)?,
        created_at: parse_timestamp(&created_at)?,
    })
}
