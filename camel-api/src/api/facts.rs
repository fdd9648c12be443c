//! Fact lookup endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::facts::FactsOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FactsQuery {
    #[serde(default)]
    pub breed_name: String,
}

/// POST /api/features/facts?breed_name=...
///
/// Generator failures are reported inside the body, never as an error status.
pub async fn get_facts(
    State(state): State<AppState>,
    query: Result<Query<FactsQuery>, QueryRejection>,
) -> ApiResult<Json<FactsOutcome>> {
    let Query(query) = query?;
    let breed = query.breed_name.trim();
    if breed.is_empty() {
        return Err(ApiError::invalid("breed_name", "breed_name is required"));
    }

    Ok(Json(state.facts.get_facts(breed).await))
}
