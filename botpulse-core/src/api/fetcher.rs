//! Analytics request, validation and normalization.

use std::sync::Arc;

use super::{HttpResponse, HttpTransport};
use crate::error::FetchError;
use crate::types::{AnalyticsPayload, AnalyticsSnapshot, ErrorBody};

/// Fetches `GET {base_url}/analytics` and turns the body into an
/// [`AnalyticsSnapshot`].
#[derive(Debug, Clone)]
pub struct AnalyticsFetcher {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl AnalyticsFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str) -> Self {
        Self {
            transport,
            url: format!("{}/analytics", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue the request and validate the payload.
    ///
    /// On success `daily_messages` is already sorted ascending by date.
    pub async fn fetch(&self) -> Result<AnalyticsSnapshot, FetchError> {
        let response = self.transport.get(&self.url).await?;

        if !response.is_success() {
            return Err(server_error(&response));
        }

        parse_snapshot(&response)
    }
}

fn server_error(response: &HttpResponse) -> FetchError {
    let message = serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.error);
    FetchError::server(response.status, message)
}

/// Anything other than a JSON object carrying the analytics fields is
/// rejected as [`FetchError::InvalidPayload`].
fn parse_snapshot(response: &HttpResponse) -> Result<AnalyticsSnapshot, FetchError> {
    let value = match response.json() {
        Some(value @ serde_json::Value::Object(_)) => value,
        _ => return Err(FetchError::InvalidPayload),
    };

    let payload: AnalyticsPayload = serde_json::from_value(value).map_err(|e| {
        tracing::debug!(error = %e, "Analytics payload did not match the expected shape");
        FetchError::InvalidPayload
    })?;

    Ok(AnalyticsSnapshot::from_payload(payload))
}
