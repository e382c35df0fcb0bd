pub mod dashboard;
pub mod processor;
pub mod report;
pub mod runtime;

pub use dashboard::{
    BugId, BugRecord, BugStatus, CrashReference, DashboardClient, DashboardError,
    DashboardOptions, HttpDashboard, UpdateReportRequest,
};
pub use processor::fetch_pool::{FetchPoolParams, RecordFetchPool};
pub use processor::orchestrator::{Orchestrator, RunSummary};
pub use processor::pipeline::{
    FailureReason, PipelineError, RecordOutcome, ReportPipeline, SkipReason,
};
pub use processor::substitute::substitute_symbolized_report;
pub use report::{
    CrashInterpreter, InterpreterFactory, KernelInterpreter, KernelInterpreterFactory,
    ParsedReport, Platform,
};
pub use runtime::config::{FillConfig, FillConfigBuilder, FillConfigParams};
pub use runtime::fatal::FatalErrorHandler;
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
