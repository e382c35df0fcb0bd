use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// OS/architecture pair selecting the crash format and symbol rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Structured crash extracted from a console log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReport {
    pub title: String,
    /// Crash text starting at the title line. Symbolization reads and may rewrite it.
    pub report: String,
    pub guilty_file: Option<String>,
}

impl ParsedReport {
    /// Returns the derived guilty file, treating an empty path as absent.
    pub fn guilty_file(&self) -> Option<&str> {
        self.guilty_file
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }
}

/// Crash parser/symbolizer bound to one platform.
pub trait CrashInterpreter: Send + Sync {
    /// Returns `None` when the log holds no recognizable crash.
    fn parse(&self, log: &str) -> Option<ParsedReport>;

    /// Resolves source locations in `report` and fills in `guilty_file` on a best-effort basis.
    fn symbolize(&self, report: &mut ParsedReport) -> Result<()>;
}

/// Builds interpreters for a platform. Errors mean the platform table itself is broken.
pub trait InterpreterFactory: Send + Sync {
    fn new_interpreter(&self, platform: &Platform) -> Result<Arc<dyn CrashInterpreter>>;
}
