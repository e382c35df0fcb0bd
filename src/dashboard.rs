//! Dashboard plumbing: wire types, the `/api` form codec, client options, and
//! the HTTP client used to list, load, and update bug reports.

pub mod client;
pub mod options;
pub mod payload;
pub mod types;

pub use client::{DashboardClient, DashboardError, HttpDashboard};
pub use options::DashboardOptions;
pub use types::{BugId, BugRecord, BugStatus, CrashReference, UpdateReportRequest};
