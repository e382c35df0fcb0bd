//! Kernel console log interpreter.
//!
//! Parsing locates the first crash title in the console output and keeps the
//! text from there on. Symbolization does not resolve raw addresses: it only
//! reads frames that already carry `file:line` locations and picks the guilty
//! file from them.

use crate::report::guilty::extract_guilty_file;
use crate::report::interpreter::{CrashInterpreter, InterpreterFactory, ParsedReport, Platform};
use crate::report::targets::{self, OsFamily, TargetSpec};
use anyhow::{anyhow, bail, Result};
use std::sync::Arc;

/// A crash title: a line prefix, optionally with a marker that must follow it.
#[derive(Debug, Clone, Copy)]
struct Title {
    prefix: &'static str,
    marker: Option<&'static str>,
}

impl Title {
    const fn prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            marker: None,
        }
    }

    const fn with_marker(prefix: &'static str, marker: &'static str) -> Self {
        Self {
            prefix,
            marker: Some(marker),
        }
    }

    fn matches(&self, content: &str) -> bool {
        match content.strip_prefix(self.prefix) {
            Some(rest) => self.marker.map_or(true, |marker| rest.contains(marker)),
            None => false,
        }
    }
}

const LINUX_TITLES: &[Title] = &[
    Title::prefix("BUG: KASAN:"),
    Title::prefix("BUG: KMSAN:"),
    Title::prefix("BUG: KCSAN:"),
    Title::prefix("KASAN:"),
    Title::prefix("UBSAN:"),
    Title::prefix("BUG: unable to handle"),
    Title::prefix("BUG:"),
    Title::prefix("general protection fault"),
    Title::prefix("kernel BUG at"),
    Title::prefix("Unable to handle kernel"),
    Title::prefix("WARNING:"),
    Title::with_marker("INFO: task ", " blocked for more than "),
    Title::with_marker("INFO: rcu_", " detected stall"),
    Title::prefix("INFO: rcu detected stall"),
    Title::prefix("Kernel panic"),
];

/// Subsystem tags printed in front of some titles, e.g. `rcu: INFO: rcu_preempt detected stalls`.
const LINUX_SUBSYSTEM_PREFIXES: &[&str] = &["rcu: "];

const BSD_TITLES: &[Title] = &[
    Title::prefix("panic:"),
    Title::prefix("Fatal trap"),
    Title::prefix("fatal protection fault"),
    Title::prefix("fatal page fault"),
    Title::prefix("uvm_fault("),
    Title::prefix("lock order reversal:"),
    Title::prefix("witness:"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct KernelInterpreterFactory;

impl InterpreterFactory for KernelInterpreterFactory {
    fn new_interpreter(&self, platform: &Platform) -> Result<Arc<dyn CrashInterpreter>> {
        let target = targets::lookup(platform)
            .ok_or_else(|| anyhow!("unsupported crash target {platform}"))?;
        tracing::debug!(%platform, family = ?target.family, "initialised crash interpreter");
        Ok(Arc::new(KernelInterpreter::new(target)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KernelInterpreter {
    target: &'static TargetSpec,
}

impl KernelInterpreter {
    pub fn new(target: &'static TargetSpec) -> Self {
        Self { target }
    }

    fn titles(&self) -> &'static [Title] {
        match self.target.family {
            OsFamily::Linux => LINUX_TITLES,
            OsFamily::Bsd => BSD_TITLES,
        }
    }

    fn subsystem_prefixes(&self) -> &'static [&'static str] {
        match self.target.family {
            OsFamily::Linux => LINUX_SUBSYSTEM_PREFIXES,
            OsFamily::Bsd => &[],
        }
    }

    fn is_title(&self, content: &str) -> bool {
        let content = self
            .subsystem_prefixes()
            .iter()
            .find_map(|prefix| content.strip_prefix(prefix))
            .unwrap_or(content);
        self.titles().iter().any(|title| title.matches(content))
    }
}

impl CrashInterpreter for KernelInterpreter {
    fn parse(&self, log: &str) -> Option<ParsedReport> {
        let mut offset = 0;

        for line in log.split_inclusive('\n') {
            let start = offset;
            offset += line.len();

            let content = strip_console_prefix(line.trim_end());
            if self.is_title(content) {
                return Some(ParsedReport {
                    title: content.to_owned(),
                    report: log[start..].to_owned(),
                    guilty_file: None,
                });
            }
        }
        None
    }

    fn symbolize(&self, report: &mut ParsedReport) -> Result<()> {
        if report.report.trim().is_empty() {
            bail!("report for {:?} has no text to symbolize", report.title);
        }
        report.guilty_file = extract_guilty_file(&report.report);
        Ok(())
    }
}

/// Drops `[  123.456789]` timestamps and `[T1234]`/`[ C0]` caller tags.
fn strip_console_prefix(line: &str) -> &str {
    let mut rest = line.trim_start();
    while let Some(tail) = rest.strip_prefix('[') {
        let Some(end) = tail.find(']') else {
            break;
        };
        let tag = tail[..end].trim();
        let is_prefix_tag = !tag.is_empty()
            && tag
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.' || c == 'T' || c == 'C');
        if !is_prefix_tag {
            break;
        }
        rest = tail[end + 1..].trim_start();
    }
    rest
}
