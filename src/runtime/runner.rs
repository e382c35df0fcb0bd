use crate::dashboard::{DashboardClient, HttpDashboard};
use crate::processor::orchestrator::{Orchestrator, RunSummary};
use crate::report::{InterpreterFactory, KernelInterpreterFactory};
use crate::runtime::config::FillConfig;
use crate::runtime::telemetry::Telemetry;
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Drives one fill run and handles OS signals for graceful shutdowns.
pub struct Runner {
    orchestrator: Orchestrator,
    shutdown: CancellationToken,
}

impl Runner {
    /// Creates a runner over explicit collaborators and wires a root [`CancellationToken`]
    /// that propagates to the fetch pool and the metrics reporter.
    pub fn new(
        config: FillConfig,
        dashboard: Arc<dyn DashboardClient>,
        factory: Arc<dyn InterpreterFactory>,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(config, dashboard, factory),
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds the HTTP dashboard client and the kernel interpreter for `config`.
    pub fn from_config(config: FillConfig) -> Result<Self> {
        let dashboard = HttpDashboard::from_config(&config)?;
        tracing::info!(dashboard = dashboard.endpoint(), "dashboard client ready");
        Ok(Self::new(
            config,
            Arc::new(dashboard),
            Arc::new(KernelInterpreterFactory),
        ))
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.orchestrator.telemetry()
    }

    /// Runs to completion, until a fatal error, or until the shutdown token is cancelled.
    pub async fn run(&self) -> Result<RunSummary> {
        self.orchestrator.run(&self.shutdown).await
    }

    /// Like [`Runner::run`], additionally cancelling the run on Ctrl-C (SIGINT).
    pub async fn run_until_ctrl_c(&self) -> Result<RunSummary> {
        let run = self.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => result,
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; stopping fill run");
                self.shutdown.cancel();
                run.await
            }
        }
    }
}
