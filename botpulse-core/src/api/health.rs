//! Liveness check run before every analytics request.

use std::sync::Arc;

use super::HttpTransport;

/// Probes `GET {base_url}/health`.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl HealthProbe {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str) -> Self {
        Self {
            transport,
            url: format!("{}/health", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `true` only for a 2xx answer. Transport errors and every other
    /// status count as unhealthy; nothing is retried here.
    pub async fn probe(&self) -> bool {
        match self.transport.get(&self.url).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                tracing::debug!(url = %self.url, status = response.status, "Health check failed");
                false
            }
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "Health check unreachable");
                false
            }
        }
    }
}
