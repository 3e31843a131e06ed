//! OPRF evaluation endpoint

use axum::{extract::State, Json};

use blindfeed_protocol::{EvaluateRequest, EvaluateResponse};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// POST /oprf_evaluate
///
/// Evaluates `E = k·B` for a client-blinded element `B`. The server learns
/// nothing about the underlying indicator.
pub async fn oprf_evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>> {
    let blinded = hex::decode(&request.blinded)
        .map_err(|e| ServerError::InvalidEncoding(format!("blinded: {e}")))?;

    let datasets = state.datasets.clone();
    let evaluated = tokio::task::spawn_blocking(move || {
        datasets.evaluate_oprf(&request.data_type, &blinded)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("task join error: {e}")))??;

    Ok(Json(EvaluateResponse {
        evaluated: hex::encode(evaluated),
    }))
}
