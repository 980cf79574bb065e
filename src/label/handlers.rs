use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{auth::extractors::CurrentUser, error::ApiError, state::AppState};

use super::analyzer::{analyze, IngredientVerdict};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/label/analyze", post(analyze_label))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub ingredients: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: Vec<IngredientVerdict>,
}

#[instrument(skip_all)]
pub async fn analyze_label(
    CurrentUser(_user): CurrentUser,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let analysis = analyze(&payload.ingredients)?;
    Ok(Json(AnalyzeResponse {
        success: true,
        analysis,
    }))
}
