//! Change-log and suite-discovery endpoints

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use blindfeed_protocol::{EncryptionInfo, SYNC_MODE_HEADER};

use crate::error::{Result, ServerError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SyncParams {
    pub data_type: String,
    /// Last chain hash the client has applied, if any.
    pub hash: Option<String>,
}

/// GET /sync_data?data_type=NAME[&hash=HEX]
///
/// Returns the change log as newline-delimited records. The `X-Sync-Mode`
/// header tells the client whether the body is a `full` replay or a `delta`
/// after its hash.
pub async fn sync_data(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<impl IntoResponse> {
    let datasets = state.datasets.clone();
    let (records, mode) = tokio::task::spawn_blocking(move || {
        datasets.read_changes(&params.data_type, params.hash.as_deref())
    })
    .await
    .map_err(|e| ServerError::Internal(format!("task join error: {e}")))??;

    let mut body = String::new();
    for record in &records {
        body.push_str(&record.encode_line());
        body.push('\n');
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(SYNC_MODE_HEADER, HeaderValue::from_static(mode.as_str()));

    tracing::debug!(
        records = records.len(),
        mode = mode.as_str(),
        "served change log"
    );

    Ok((StatusCode::OK, headers, body))
}

#[derive(Deserialize)]
pub struct EncryptionTypeParams {
    pub data_type: String,
}

/// GET /encryption_type?data_type=NAME
///
/// Advertises the OPRF suite and metadata encryption in use, so clients can
/// refuse to talk to a server speaking something else.
pub async fn encryption_type(
    State(state): State<AppState>,
    Query(params): Query<EncryptionTypeParams>,
) -> Result<Json<EncryptionInfo>> {
    let datasets = state.datasets.clone();
    let name = params.data_type.clone();
    tokio::task::spawn_blocking(move || datasets.schema(&name))
        .await
        .map_err(|e| ServerError::Internal(format!("task join error: {e}")))??;

    Ok(Json(EncryptionInfo::current(&params.data_type)))
}
