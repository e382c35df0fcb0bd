//! Per-record derivation state machine.
//!
//! A record moves through eligibility, platform binding, parse, substitution,
//! symbolize, extract and persist. Every state but platform binding ends in a
//! [`RecordOutcome`]; a platform that cannot be bound is a [`PipelineError`]
//! and aborts the run.

use crate::dashboard::{BugId, BugRecord, BugStatus, DashboardClient, UpdateReportRequest};
use crate::processor::substitute::substitute_symbolized_report;
use crate::report::{CrashInterpreter, InterpreterFactory, Platform};
use crate::runtime::telemetry::Telemetry;
use anyhow::Error as AnyError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Updated { guilty_file: String },
    Skipped(SkipReason),
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyHasGuiltyFiles,
    StatusNotOpen(BugStatus),
    NoCrashDetected,
    SymbolizeFailed(String),
    NoGuiltyFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyHasGuiltyFiles => f.write_str("already has guilty files"),
            SkipReason::StatusNotOpen(status) => write!(f, "status is not open ({status})"),
            SkipReason::NoCrashDetected => f.write_str("no crash is detected"),
            SkipReason::SymbolizeFailed(error) => write!(f, "symbolize failed: {error}"),
            SkipReason::NoGuiltyFile => f.write_str("no guilty files extracted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    SaveFailed(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::SaveFailed(error) => write!(f, "failed to save: {error}"),
        }
    }
}

/// Run-aborting pipeline failure. Per-record problems are never reported through this type.
#[derive(Debug)]
pub enum PipelineError {
    InterpreterInit {
        bug: BugId,
        platform: Platform,
        source: AnyError,
    },
}

impl PipelineError {
    pub fn bug(&self) -> &BugId {
        match self {
            PipelineError::InterpreterInit { bug, .. } => bug,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InterpreterInit {
                bug,
                platform,
                source,
            } => write!(
                f,
                "{bug}: failed to create a crash interpreter for {platform}: {source:#}"
            ),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::InterpreterInit { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Single-consumer report pipeline. Owns the interpreter cache, so it is driven by `&mut self`.
pub struct ReportPipeline {
    dashboard: Arc<dyn DashboardClient>,
    factory: Arc<dyn InterpreterFactory>,
    interpreters: HashMap<Platform, Arc<dyn CrashInterpreter>>,
    telemetry: Arc<Telemetry>,
}

impl ReportPipeline {
    pub fn new(
        dashboard: Arc<dyn DashboardClient>,
        factory: Arc<dyn InterpreterFactory>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            dashboard,
            factory,
            interpreters: HashMap::new(),
            telemetry,
        }
    }

    /// Drives one record to a terminal state, persisting its guilty file when one is derived.
    pub async fn process(&mut self, record: BugRecord) -> Result<RecordOutcome, PipelineError> {
        let bug = record.id.clone();

        if record.has_guilty_files() {
            return Ok(self.skip(&bug, SkipReason::AlreadyHasGuiltyFiles));
        }
        if !record.status.is_open() {
            return Ok(self.skip(&bug, SkipReason::StatusNotOpen(record.status)));
        }

        let interpreter = self.interpreter_for(&record)?;

        let Some(mut parsed) = interpreter.parse(&record.log) else {
            return Ok(self.skip(&bug, SkipReason::NoCrashDetected));
        };

        substitute_symbolized_report(&mut parsed, &record);

        if let Err(err) = interpreter.symbolize(&mut parsed) {
            return Ok(self.skip(&bug, SkipReason::SymbolizeFailed(format!("{err:#}"))));
        }

        let Some(guilty_file) = parsed.guilty_file().map(str::to_owned) else {
            return Ok(self.skip(&bug, SkipReason::NoGuiltyFile));
        };

        let request =
            UpdateReportRequest::guilty_files(bug.clone(), record.crash_id, vec![guilty_file.clone()]);
        match self.dashboard.update_report(&request).await {
            Ok(()) => {
                self.telemetry.record_updated();
                tracing::info!(bug = %bug, guilty_file = %guilty_file, "updated");
                Ok(RecordOutcome::Updated { guilty_file })
            }
            Err(err) => {
                let reason = FailureReason::SaveFailed(format!("{err:#}"));
                self.telemetry.record_failed();
                tracing::warn!(bug = %bug, reason = %reason, "record failed");
                Ok(RecordOutcome::Failed(reason))
            }
        }
    }

    fn interpreter_for(
        &mut self,
        record: &BugRecord,
    ) -> Result<Arc<dyn CrashInterpreter>, PipelineError> {
        let platform = Platform::new(record.os.as_str(), record.arch.as_str());
        if let Some(interpreter) = self.interpreters.get(&platform) {
            return Ok(interpreter.clone());
        }

        match self.factory.new_interpreter(&platform) {
            Ok(interpreter) => {
                self.interpreters.insert(platform, interpreter.clone());
                Ok(interpreter)
            }
            Err(source) => Err(PipelineError::InterpreterInit {
                bug: record.id.clone(),
                platform,
                source,
            }),
        }
    }

    fn skip(&self, bug: &BugId, reason: SkipReason) -> RecordOutcome {
        self.telemetry.record_skipped();
        tracing::info!(bug = %bug, reason = %reason, "record skipped");
        RecordOutcome::Skipped(reason)
    }
}
