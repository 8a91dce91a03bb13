//! Analytics API client
//!
//! Two endpoints are used, both relative to the configured base URL:
//!
//! - `GET /health`: liveness, answered by [`HealthProbe`]
//! - `GET /analytics`: the usage aggregate, fetched by [`AnalyticsFetcher`]
//!
//! Both sit on an [`HttpTransport`], which is [`ReqwestTransport`] outside
//! of tests.

mod fetcher;
mod health;
mod transport;

pub use fetcher::AnalyticsFetcher;
pub use health::HealthProbe;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
