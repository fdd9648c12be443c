//! Prediction endpoints: classify, history, fetch, delete

use axum::{
    extract::{rejection::QueryRejection, Multipart, Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::facts::FactsOutcome;
use crate::models::{PredictionRecord, PredictionSummary, Probabilities, TraitScores};
use crate::pagination::{calculate_page, HistoryQuery};
use crate::pipeline::{self, ClassifyRequest, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::AppState;

/// Full prediction as returned to clients
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub id: i64,
    pub breed: String,
    pub confidence: f64,
    pub rating: f64,
    pub probabilities: Probabilities,
    /// Base64 PNG explanation overlay
    pub gradcam_image: String,
    pub is_dromedary_fallback: bool,
    pub head_size: f64,
    pub leg_condition: f64,
    pub coat_quality: f64,
    pub overall_fitness: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts: Option<FactsOutcome>,
}

impl From<PredictionRecord> for PredictionResponse {
    fn from(record: PredictionRecord) -> Self {
        Self {
            id: record.id,
            breed: record.breed,
            confidence: record.confidence,
            rating: record.rating,
            probabilities: record.probabilities,
            gradcam_image: record.explanation_png,
            is_dromedary_fallback: record.is_fallback,
            head_size: record.traits.head_size,
            leg_condition: record.traits.leg_condition,
            coat_quality: record.traits.coat_quality,
            overall_fitness: record.traits.overall_fitness,
            created_at: record.created_at,
            facts: None,
        }
    }
}

/// History row (no explanation image)
#[derive(Debug, Serialize)]
pub struct PredictionSummaryResponse {
    pub id: i64,
    pub breed: String,
    pub confidence: f64,
    pub rating: f64,
    pub probabilities: Probabilities,
    pub is_dromedary_fallback: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PredictionSummary> for PredictionSummaryResponse {
    fn from(summary: PredictionSummary) -> Self {
        Self {
            id: summary.id,
            breed: summary.breed,
            confidence: summary.confidence,
            rating: summary.rating,
            probabilities: summary.probabilities,
            is_dromedary_fallback: summary.is_fallback,
            created_at: summary.created_at,
        }
    }
}

/// Parsed multipart form for classify
#[derive(Debug)]
struct ClassifyForm {
    image: Vec<u8>,
    traits: TraitScores,
    confidence_threshold: f64,
    include_facts: bool,
}

fn parse_number(field: &str, text: &str) -> ApiResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| ApiError::invalid(field, format!("{} must be a number", field)))
}

fn parse_flag(field: &str, text: &str) -> ApiResult<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ApiError::invalid(field, format!("{} must be a boolean", field))),
    }
}

async fn read_classify_form(mut multipart: Multipart) -> ApiResult<ClassifyForm> {
    let mut image = None;
    let mut traits = TraitScores::default();
    let mut confidence_threshold = DEFAULT_CONFIDENCE_THRESHOLD;
    let mut include_facts = false;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let is_image = field
                .content_type()
                .map(|ct| ct.starts_with("image/"))
                .unwrap_or(false);
            if !is_image {
                return Err(ApiError::invalid("file", "File must be an image"));
            }
            image = Some(field.bytes().await?.to_vec());
            continue;
        }

        let text = field.text().await?;
        match name.as_str() {
            "head_size" => traits.head_size = parse_number(&name, &text)?,
            "leg_condition" => traits.leg_condition = parse_number(&name, &text)?,
            "coat_quality" => traits.coat_quality = parse_number(&name, &text)?,
            "overall_fitness" => traits.overall_fitness = parse_number(&name, &text)?,
            "confidence_threshold" => confidence_threshold = parse_number(&name, &text)?,
            "include_facts" => include_facts = parse_flag(&name, &text)?,
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ApiError::invalid("file", "file is required"))?;

    Ok(ClassifyForm {
        image,
        traits,
        confidence_threshold,
        include_facts,
    })
}

/// POST /api/predict/classify
pub async fn classify(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> ApiResult<Json<PredictionResponse>> {
    let form = read_classify_form(multipart).await?;

    let record = pipeline::classify(
        &state.db,
        state.model.clone(),
        user.id,
        ClassifyRequest {
            image: form.image,
            traits: form.traits,
            confidence_threshold: form.confidence_threshold,
        },
    )
    .await?;

    // Persisted already; a fact lookup failure only leaves `facts.error` set
    let facts = if form.include_facts {
        Some(state.facts.get_facts(&record.breed).await)
    } else {
        None
    };

    let mut response = PredictionResponse::from(record);
    response.facts = facts;
    Ok(Json(response))
}

/// GET /api/predict/history
pub async fn history(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<PredictionSummaryResponse>>> {
    let Query(query) = query?;
    let page = calculate_page(query);
    let rows = db::list_predictions(&state.db, user.id, page.offset, page.limit).await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /api/predict/:id
pub async fn get_prediction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(prediction_id): Path<i64>,
) -> ApiResult<Json<PredictionResponse>> {
    let record = db::get_prediction(&state.db, user.id, prediction_id)
        .await?
        .ok_or_else(|| not_found(prediction_id))?;

    Ok(Json(record.into()))
}

/// DELETE /api/predict/:id
pub async fn delete_prediction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(prediction_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !db::delete_prediction(&state.db, user.id, prediction_id).await? {
        return Err(not_found(prediction_id));
    }

    info!(user_id = user.id, prediction_id = prediction_id, "Prediction deleted");
    Ok(Json(json!({ "message": "Prediction deleted successfully" })))
}

fn not_found(prediction_id: i64) -> ApiError {
    ApiError::NotFound(format!("Prediction {} not found", prediction_id))
}
