//! Scripted transport shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{HttpResponse, HttpTransport};
use crate::error::FetchError;

pub(crate) const BASE_URL: &str = "http://analytics.test/api";

pub(crate) fn health_url() -> String {
    format!("{}/health", BASE_URL)
}

pub(crate) fn analytics_url() -> String {
    format!("{}/analytics", BASE_URL)
}

/// Answers each URL from a queue of canned results. Once a queue is down to
/// its last entry that entry is repeated, so a single scripted failure keeps
/// failing for every retry.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<HttpResponse, FetchError>>>>,
    calls: Mutex<HashMap<String, usize>>,
    latency: Mutex<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, url: &str, result: Result<HttpResponse, FetchError>) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Drop whatever is still queued for `url`
    pub(crate) fn clear(&self, url: &str) -> &Self {
        self.scripts.lock().unwrap().remove(url);
        self
    }

    pub(crate) fn healthy(&self) -> &Self {
        self.push(&health_url(), Ok(HttpResponse::new(200, r#"{"status":"healthy"}"#)))
    }

    pub(crate) fn unhealthy(&self) -> &Self {
        self.push(&health_url(), Ok(HttpResponse::new(503, "")))
    }

    pub(crate) fn analytics(&self, status: u16, body: &str) -> &Self {
        self.push(&analytics_url(), Ok(HttpResponse::new(status, body)))
    }

    /// Every call takes `latency` of (virtual) time before answering
    pub(crate) fn with_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let result = {
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts
                .get_mut(url)
                .unwrap_or_else(|| panic!("no script for {url}"));
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        };

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

pub(crate) fn sample_body() -> &'static str {
    r#"{
        "total_users": 12,
        "total_messages": 340,
        "sentiment_distribution": [
            {"_id": "positive", "count": 200},
            {"_id": "neutral", "count": 100},
            {"_id": "negative", "count": 40}
        ],
        "daily_messages": [
            {"_id": "2024-01-03", "count": 5},
            {"_id": "2024-01-01", "count": 2}
        ]
    }"#
}
