//! HTTP transport to a blindfeed server

use blindfeed_protocol::{
    EncryptionInfo, ErrorBody, EvaluateRequest, EvaluateResponse, SyncMode, SYNC_MODE_HEADER,
};

use crate::error::{ClientError, Result};

/// One server, addressed by base URL.
pub struct ServerEndpoint {
    base_url: String,
    http: reqwest::Client,
}

impl ServerEndpoint {
    /// Accepts `host:port` or a full `http(s)://` URL.
    pub fn new(server: &str) -> Self {
        let trimmed = server.trim_end_matches('/');
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Directory-safe label for this server, used to key local state.
    pub fn label(&self) -> String {
        self.base_url
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            })
            .collect()
    }

    /// GET /sync_data: returns the raw log body and the sync mode.
    pub async fn fetch_changes(
        &self,
        dataset: &str,
        since: Option<&str>,
    ) -> Result<(String, SyncMode)> {
        let mut query: Vec<(&str, &str)> = vec![("data_type", dataset)];
        if let Some(hash) = since {
            query.push(("hash", hash));
        }

        let response = self
            .http
            .get(format!("{}/sync_data", self.base_url))
            .query(&query)
            .send()
            .await?;
        let response = check_status(response).await?;

        let mode = response
            .headers()
            .get(SYNC_MODE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ClientError::InvalidResponse("missing sync-mode header".to_string()))
            .and_then(|value| {
                SyncMode::parse(value)
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))
            })?;

        Ok((response.text().await?, mode))
    }

    /// GET /encryption_type: the suite the server speaks for this dataset.
    pub async fn encryption_info(&self, dataset: &str) -> Result<EncryptionInfo> {
        let response = self
            .http
            .get(format!("{}/encryption_type", self.base_url))
            .query(&[("data_type", dataset)])
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST /oprf_evaluate: `E = k·B` for a blinded element.
    pub async fn evaluate(&self, dataset: &str, blinded: &[u8]) -> Result<[u8; 32]> {
        let request = EvaluateRequest {
            data_type: dataset.to_string(),
            blinded: hex::encode(blinded),
        };
        let response = self
            .http
            .post(format!("{}/oprf_evaluate", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: EvaluateResponse = response.json().await?;

        let bytes = hex::decode(&body.evaluated)
            .map_err(|e| ClientError::InvalidResponse(format!("evaluated: {e}")))?;
        bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| {
                ClientError::InvalidResponse(format!(
                    "evaluated element must be 32 bytes, got {}",
                    bytes.len()
                ))
            })
    }
}

/// Turn non-2xx responses into `ClientError::Server`, extracting the error
/// envelope when the body carries one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.text().await {
        Ok(body) => match serde_json::from_str::<ErrorBody>(&body) {
            Ok(envelope) => envelope.error,
            Err(_) => body,
        },
        Err(_) => String::new(),
    };
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}
