//! Run orchestration: list open bugs, fan the fetches out over the record
//! fetch pool and drain the fetched records through the report pipeline.
//!
//! The pipeline runs in the task that calls [`Orchestrator::run`], one record
//! at a time, so dashboard updates never overlap each other even while fetches
//! are still in flight.

use crate::dashboard::DashboardClient;
use crate::processor::fetch_pool::{FetchPoolParams, RecordFetchPool};
use crate::processor::lifecycle::{LifecycleHandles, LifecycleSpawnParams};
use crate::processor::pipeline::ReportPipeline;
use crate::report::InterpreterFactory;
use crate::runtime::config::FillConfig;
use crate::runtime::telemetry::{Telemetry, TelemetrySnapshot};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;

/// Final counters of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: u64,
    pub fetched: u64,
    pub not_found: u64,
    pub fetch_errors: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub progress_markers: u64,
    /// The run was cancelled from outside before every record was processed.
    pub interrupted: bool,
}

impl RunSummary {
    fn from_snapshot(snapshot: TelemetrySnapshot, interrupted: bool) -> Self {
        Self {
            listed: snapshot.listed,
            fetched: snapshot.fetched,
            not_found: snapshot.not_found,
            fetch_errors: snapshot.fetch_errors,
            updated: snapshot.updated,
            skipped: snapshot.skipped,
            failed: snapshot.failed,
            progress_markers: snapshot.progress_markers,
            interrupted,
        }
    }
}

pub struct Orchestrator {
    config: FillConfig,
    dashboard: Arc<dyn DashboardClient>,
    factory: Arc<dyn InterpreterFactory>,
    telemetry: Arc<Telemetry>,
}

impl Orchestrator {
    pub fn new(
        config: FillConfig,
        dashboard: Arc<dyn DashboardClient>,
        factory: Arc<dyn InterpreterFactory>,
    ) -> Self {
        Self {
            config,
            dashboard,
            factory,
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Processes every open bug once. Fatal errors cancel `shutdown_root` and are returned.
    pub async fn run(&self, shutdown_root: &CancellationToken) -> Result<RunSummary> {
        let lifecycle = LifecycleHandles::spawn(LifecycleSpawnParams {
            shutdown_root,
            telemetry: self.telemetry.clone(),
            metrics_interval: self.config.metrics_interval(),
        });

        let result = self.drive(&lifecycle).await;
        let interrupted = lifecycle.run_token.is_cancelled();
        let captured = lifecycle.error();
        lifecycle.shutdown().await;

        result?;
        if let Some(err) = captured {
            return Err(err);
        }

        let snapshot = self.telemetry.snapshot();
        let summary = RunSummary::from_snapshot(snapshot, interrupted);
        tracing::info!(
            processed = snapshot.processed(),
            listed = summary.listed,
            fetched = summary.fetched,
            not_found = summary.not_found,
            fetch_errors = summary.fetch_errors,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "fill run finished"
        );
        Ok(summary)
    }

    async fn drive(&self, lifecycle: &LifecycleHandles) -> Result<()> {
        let fatal_handler = lifecycle.fatal_handler();

        let listed = select! {
            biased;
            _ = lifecycle.run_token.cancelled() => {
                tracing::info!("run cancelled before the bug list was loaded");
                return Ok(());
            }
            listed = self.dashboard.bug_list() => listed,
        };
        let ids = match listed.context("bug list query failed") {
            Ok(ids) => ids,
            Err(err) => return Err(fatal_handler.trigger_external("bug list", err)),
        };

        self.telemetry.record_listed(ids.len());
        tracing::info!(count = ids.len(), "loaded open bug list");

        let mut pool = RecordFetchPool::launch(
            FetchPoolParams {
                dashboard: self.dashboard.clone(),
                telemetry: self.telemetry.clone(),
                thread_count: self.config.thread_count(),
                log_step: self.config.log_step(),
                record_buffer: self.config.record_buffer(),
            },
            ids,
            lifecycle.run_token.clone(),
            fatal_handler.clone(),
        );
        let mut pipeline = ReportPipeline::new(
            self.dashboard.clone(),
            self.factory.clone(),
            self.telemetry.clone(),
        );

        let mut outcome = Ok(());
        while let Some(record) = pool.next_record().await {
            if let Err(err) = pipeline.process(record).await {
                outcome = Err(fatal_handler.trigger(err));
                break;
            }
        }
        pool.join().await;

        outcome
    }
}
