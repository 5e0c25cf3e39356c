//! Client for the project costs REST backend.

use async_trait::async_trait;
use reqwest::Client;
use service_core::observability::TracedClientExt;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::costing::CostOverflow;
use super::metrics;
use crate::config::BackendSettings;
use crate::models::ProjectRollup;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Could not reach the costs backend: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("Costs backend responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode the costs backend response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Costs backend sent figures outside the supported range")]
    OutOfRange(#[from] CostOverflow),
}

/// Read and write the cost rollup of one project.
#[async_trait]
pub trait CostsBackend: Send + Sync {
    async fn fetch_costs(&self, project_id: i64) -> Result<ProjectRollup, BackendError>;

    /// Persist the whole rollup. There is no concurrency check; last write wins.
    async fn save_costs(&self, project_id: i64, rollup: &ProjectRollup)
        -> Result<(), BackendError>;
}

#[derive(Clone)]
pub struct HttpCostsBackend {
    client: Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpCostsBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.timeout(),
        }
    }

    fn costs_url(&self, project_id: i64) -> String {
        format!("{}/projectdetails/{}/costs", self.base_url, project_id)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CostsBackend for HttpCostsBackend {
    #[tracing::instrument(skip(self))]
    async fn fetch_costs(&self, project_id: i64) -> Result<ProjectRollup, BackendError> {
        let started = Instant::now();

        let result = async {
            let response = self
                .client
                .traced_get(&self.costs_url(project_id))
                .timeout(self.timeout)
                .send()
                .await
                .map_err(BackendError::Connection)?;

            check_status(response)
                .await?
                .json::<ProjectRollup>()
                .await
                .map_err(BackendError::Decode)
        }
        .await;

        metrics::record_backend_request(
            "fetch",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );

        match &result {
            Ok(rollup) => tracing::debug!(
                modules = rollup.modules.len(),
                composites = rollup.modules_composite.len(),
                "Fetched project costs"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to fetch project costs"),
        }

        result
    }

    #[tracing::instrument(skip(self, rollup))]
    async fn save_costs(
        &self,
        project_id: i64,
        rollup: &ProjectRollup,
    ) -> Result<(), BackendError> {
        let started = Instant::now();

        let result = async {
            let response = self
                .client
                .traced_put(&self.costs_url(project_id))
                .json(rollup)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(BackendError::Connection)?;

            check_status(response).await.map(|_| ())
        }
        .await;

        metrics::record_backend_request(
            "save",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );

        match &result {
            Ok(()) => tracing::info!("Saved project costs"),
            Err(e) => tracing::error!(error = %e, "Failed to save project costs"),
        }

        result
    }
}
