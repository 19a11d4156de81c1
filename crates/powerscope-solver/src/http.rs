//! HTTP solver
//!
//! Talks JSON to a solver service. Every request body is `{"model": attribs}`
//! and every response is a `SolverResponse`.
//!
//! | Call | Stateless | Stateful |
//! |------|-----------|----------|
//! | `calculate` | `POST {base}/{kind}s/calc` | `POST {base}/{kind}s` (or `/calc` without an id) |
//! | `update` | `POST {base}/{kind}s/calc` | `PUT {base}/{kind}s/{id}` |
//!
//! # Examples
//!
//! ```no_run
//! use powerscope_solver::HttpSolver;
//!
//! let solver = HttpSolver::new("http://localhost:8000/api").unwrap();
//! ```

use crate::SolverError;
use powerscope_domain::{ModelAttribs, ModelKind, Solver, SolverResponse};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default solver endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api";

/// Default timeout for solver requests (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`HttpSolver`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Base URL of the solver API
    pub endpoint: String,
    /// Re-solve with `/calc` instead of updating a server-side model
    pub stateless: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            stateless: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SolverConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Serialize)]
struct SolveRequest<'a> {
    model: &'a ModelAttribs,
}

/// Solver reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpSolver {
    endpoint: String,
    stateless: bool,
    client: reqwest::Client,
}

impl HttpSolver {
    /// Create a stateless solver with the default timeout
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SolverError> {
        Self::from_config(&SolverConfig {
            endpoint: endpoint.into(),
            ..SolverConfig::default()
        })
    }

    /// Create a solver from configuration
    pub fn from_config(config: &SolverConfig) -> Result<Self, SolverError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            stateless: config.stateless,
            client,
        })
    }

    /// Base URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether updates go through `/calc`
    pub fn is_stateless(&self) -> bool {
        self.stateless
    }

    fn collection_url(&self, kind: ModelKind) -> String {
        format!("{}/{}s", self.endpoint, kind.as_str())
    }

    fn calc_url(&self, kind: ModelKind) -> String {
        format!("{}/calc", self.collection_url(kind))
    }

    fn model_url(&self, kind: ModelKind, id: &str) -> String {
        format!("{}/{}", self.collection_url(kind), id)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        model: &ModelAttribs,
    ) -> Result<SolverResponse, SolverError> {
        let response = request.json(&SolveRequest { model }).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SolverError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn do_calculate(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> Result<SolverResponse, SolverError> {
        let url = if self.stateless || model.id.is_none() {
            self.calc_url(kind)
        } else {
            self.collection_url(kind)
        };
        debug!(%url, "Solver calculate");
        self.send(self.client.post(&url), model).await
    }

    async fn do_update(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> Result<SolverResponse, SolverError> {
        if self.stateless {
            let url = self.calc_url(kind);
            debug!(%url, "Solver update");
            return self.send(self.client.post(&url), model).await;
        }
        let id = model.id.as_deref().ok_or(SolverError::MissingId)?;
        let url = self.model_url(kind, id);
        debug!(%url, "Solver update");
        self.send(self.client.put(&url), model).await
    }
}

impl Solver for HttpSolver {
    type Error = SolverError;

    fn calculate(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> impl Future<Output = Result<SolverResponse, Self::Error>> + Send {
        self.do_calculate(kind, model)
    }

    fn update(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> impl Future<Output = Result<SolverResponse, Self::Error>> + Send {
        self.do_update(kind, model)
    }
}
