use crate::dashboard::options::DEFAULT_RESPONSE_BODY_LIMIT_BYTES;
use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::time::Duration;

pub const DEFAULT_THREAD_COUNT: usize = 8;
pub const DEFAULT_LOG_STEP: usize = 100;
const DEFAULT_RECORD_BUFFER: usize = 1;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for the fill pipeline.
///
/// All instances must be constructed via [`FillConfig::builder`] or [`FillConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillConfig {
    dashboard_url: String,
    client: String,
    key: String,
    thread_count: usize,
    log_step: usize,
    record_buffer: usize,
    request_timeout: Duration,
    metrics_interval: Duration,
    max_response_body_bytes: usize,
}

pub struct FillConfigParams {
    pub dashboard_url: String,
    pub client: String,
    pub key: String,
    pub thread_count: usize,
    pub log_step: usize,
    pub record_buffer: usize,
    pub request_timeout: Duration,
    pub metrics_interval: Duration,
    pub max_response_body_bytes: usize,
}

impl FillConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> FillConfigBuilder {
        FillConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: FillConfigParams) -> Result<Self> {
        let FillConfigParams {
            dashboard_url,
            client,
            key,
            thread_count,
            log_step,
            record_buffer,
            request_timeout,
            metrics_interval,
            max_response_body_bytes,
        } = params;

        let config = Self {
            dashboard_url: trimmed_string(dashboard_url),
            client: trimmed_string(client),
            key: trimmed_string(key),
            thread_count,
            log_step,
            record_buffer,
            request_timeout,
            metrics_interval,
            max_response_body_bytes,
        };

        config.validate()?;
        Ok(config)
    }

    /// Dashboard base address (including scheme), without the `/api` suffix.
    pub fn dashboard_url(&self) -> &str {
        &self.dashboard_url
    }

    /// Name of the API client.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// API key of the client.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of concurrent fetch workers.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Number of dispatched IDs between progress lines.
    pub fn log_step(&self) -> usize {
        self.log_step
    }

    /// Capacity of the handoff between fetch workers and the report pipeline.
    pub fn record_buffer(&self) -> usize {
        self.record_buffer
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    pub fn max_response_body_bytes(&self) -> usize {
        self.max_response_body_bytes
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.dashboard_url)?;
        ensure_not_empty(&self.client, "client")?;
        ensure_not_empty(&self.key, "key")?;

        if self.thread_count == 0 {
            bail!("thread_count must be greater than 0");
        }

        if self.log_step == 0 {
            bail!("log_step must be greater than 0");
        }

        if self.record_buffer == 0 {
            bail!("record_buffer must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        if self.max_response_body_bytes == 0 {
            bail!("max_response_body_bytes must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct FillConfigBuilder {
    dashboard_url: Option<String>,
    client: Option<String>,
    key: Option<String>,
    thread_count: Option<usize>,
    log_step: Option<usize>,
    record_buffer: Option<usize>,
    request_timeout: Option<Duration>,
    metrics_interval: Option<Duration>,
    max_response_body_bytes: Option<usize>,
}

impl FillConfigBuilder {
    pub fn dashboard_url(mut self, url: impl Into<String>) -> Self {
        self.dashboard_url = Some(url.into());
        self
    }

    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn thread_count(mut self, count: usize) -> Self {
        self.thread_count = Some(count);
        self
    }

    pub fn log_step(mut self, step: usize) -> Self {
        self.log_step = Some(step);
        self
    }

    pub fn record_buffer(mut self, capacity: usize) -> Self {
        self.record_buffer = Some(capacity);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn max_response_body_bytes(mut self, bytes: usize) -> Self {
        self.max_response_body_bytes = Some(bytes);
        self
    }

    pub fn build(self) -> Result<FillConfig> {
        let params = FillConfigParams {
            dashboard_url: self.dashboard_url.context("dashboard_url is required")?,
            client: self.client.context("client is required")?,
            key: self.key.context("key is required")?,
            thread_count: self.thread_count.unwrap_or(DEFAULT_THREAD_COUNT),
            log_step: self.log_step.unwrap_or(DEFAULT_LOG_STEP),
            record_buffer: self.record_buffer.unwrap_or(DEFAULT_RECORD_BUFFER),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
            max_response_body_bytes: self
                .max_response_body_bytes
                .unwrap_or(DEFAULT_RESPONSE_BODY_LIMIT_BYTES),
        };

        FillConfig::new(params)
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("dashboard_url must start with http:// or https://");
    }
    Ok(())
}
