//! Dashboard client implementation and the `DashboardClient` trait consumed by
//! the fetch pool and the report pipeline.
//!
//! `HttpDashboard` speaks the dashboard's `/api` endpoint: every call is a form
//! POST carrying the client name, the API key, the method name and an optional
//! gzip-compressed JSON payload. Requests use a blocking HTTP agent, so each
//! call is moved onto the blocking thread pool.

use crate::dashboard::options::DashboardOptions;
use crate::dashboard::payload::{compress_json, encode_form, FORM_CONTENT_TYPE};
use crate::dashboard::types::{
    BugId, BugListResponse, BugRecord, BugReportWire, LoadBugRequest, UpdateReportRequest,
};
use crate::runtime::config::FillConfig;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::{fmt, sync::Arc};

#[derive(Debug)]
pub enum DashboardError {
    Transport { method: &'static str, message: String },
    Status { method: &'static str, status: u16, body: String },
    InvalidResponse { method: &'static str, message: String },
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::Transport { method, message } => {
                write!(f, "dashboard {method} request failed: {message}")
            }
            DashboardError::Status {
                method,
                status,
                body,
            } => write!(f, "dashboard {method} request failed with {status}: {body}"),
            DashboardError::InvalidResponse { method, message } => {
                write!(f, "dashboard {method} returned an invalid response: {message}")
            }
        }
    }
}

impl std::error::Error for DashboardError {}

/// Remote record store holding the bug reports.
pub trait DashboardClient: Send + Sync {
    /// Lists the IDs of all currently open bugs.
    fn bug_list(&self) -> BoxFuture<'_, Result<Vec<BugId>>>;

    /// Loads the full report of one bug. Unknown IDs yield a record with an empty `id`.
    fn load_bug<'a>(&'a self, id: &'a BugId) -> BoxFuture<'a, Result<BugRecord>>;

    /// Stores derived report elements. Re-sending identical values must succeed.
    fn update_report<'a>(&'a self, request: &'a UpdateReportRequest) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct HttpDashboard {
    endpoint: Arc<String>,
    client: Arc<String>,
    key: Arc<String>,
    agent: ureq::Agent,
    options: DashboardOptions,
}

impl fmt::Debug for HttpDashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDashboard")
            .field("endpoint", &self.endpoint)
            .field("client", &self.client)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DashboardClient for HttpDashboard {
    fn bug_list(&self) -> BoxFuture<'_, Result<Vec<BugId>>> {
        Box::pin(self.bug_list())
    }

    fn load_bug<'a>(&'a self, id: &'a BugId) -> BoxFuture<'a, Result<BugRecord>> {
        Box::pin(self.load_bug(id))
    }

    fn update_report<'a>(&'a self, request: &'a UpdateReportRequest) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.update_report(request))
    }
}

impl HttpDashboard {
    pub fn new(
        url: impl Into<String>,
        client: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self> {
        Self::with_options(url, client, key, DashboardOptions::default())
    }

    pub fn with_options(
        url: impl Into<String>,
        client: impl Into<String>,
        key: impl Into<String>,
        options: DashboardOptions,
    ) -> Result<Self> {
        options.validate()?;

        let endpoint = url.into().trim().trim_end_matches('/').to_owned();
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(options.request_timeout))
            .http_status_as_error(false)
            .build();

        Ok(Self {
            endpoint: Arc::new(endpoint),
            client: Arc::new(client.into()),
            key: Arc::new(key.into()),
            agent: config.into(),
            options,
        })
    }

    pub fn from_config(config: &FillConfig) -> Result<Self> {
        config.validate()?;
        let options = DashboardOptions {
            request_timeout: config.request_timeout(),
            max_response_body_bytes: config.max_response_body_bytes(),
        };
        Self::with_options(
            config.dashboard_url().to_owned(),
            config.client().to_owned(),
            config.key().to_owned(),
            options,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn bug_list(&self) -> Result<Vec<BugId>> {
        const METHOD: &str = "bug_list";

        let body = self.query(METHOD, None).await?;
        let response: BugListResponse = decode_response(METHOD, &body)?;
        tracing::debug!(count = response.list.len(), "bug list query completed");
        Ok(response.list)
    }

    pub async fn load_bug(&self, id: &BugId) -> Result<BugRecord> {
        const METHOD: &str = "load_bug";

        let payload = compress_json(&LoadBugRequest { id: id.clone() })?;
        let body = self.query(METHOD, Some(payload)).await?;
        let wire: BugReportWire = decode_response(METHOD, &body)?;
        Ok(BugRecord::from(wire))
    }

    pub async fn update_report(&self, request: &UpdateReportRequest) -> Result<()> {
        const METHOD: &str = "update_report";

        let payload = compress_json(request)?;
        self.query(METHOD, Some(payload)).await?;
        tracing::debug!(bug = %request.bug_id, "update_report completed");
        Ok(())
    }

    async fn query(&self, method: &'static str, payload: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.query_blocking(method, payload))
            .await
            .with_context(|| format!("dashboard {method} request task failed"))?
    }

    fn query_blocking(&self, method: &'static str, payload: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let url = format!("{}/api", self.endpoint);
        let mut fields: Vec<(&str, &[u8])> = vec![
            ("client", self.client.as_bytes()),
            ("key", self.key.as_bytes()),
            ("method", method.as_bytes()),
        ];
        if let Some(payload) = payload.as_deref() {
            fields.push(("payload", payload));
        }
        let form = encode_form(&fields);

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .send(&form[..])
            .map_err(|err| DashboardError::Transport {
                method,
                message: err.to_string(),
            })?;

        let status = response.status().as_u16();
        let limit = u64::try_from(self.options.max_response_body_bytes).unwrap_or(u64::MAX);
        let mut body = response.into_body();
        let bytes = body
            .with_config()
            .limit(limit)
            .read_to_vec()
            .map_err(|err| DashboardError::Transport {
                method,
                message: format!("failed to read response body: {err}"),
            })?;

        if status != 200 {
            return Err(DashboardError::Status {
                method,
                status,
                body: String::from_utf8_lossy(&bytes).trim().to_owned(),
            }
            .into());
        }

        Ok(bytes)
    }
}

fn decode_response<T: DeserializeOwned>(method: &'static str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|err| {
        DashboardError::InvalidResponse {
            method,
            message: err.to_string(),
        }
        .into()
    })
}
