//! Report substitution applied between parsing and symbolization.

use crate::dashboard::BugRecord;
use crate::report::ParsedReport;

/// Replaces the parsed crash text with the dashboard's already-symbolized report.
///
/// Symbolizing a raw console log needs the kernel image the crash came from,
/// which is not available offline. The dashboard keeps a report that has been
/// symbolized before, so the interpreter's symbolization step runs over that
/// text instead. This is best effort: it relies on the interpreter accepting
/// resolved text in place of raw output, and results degrade silently when the
/// two formats drift apart.
pub fn substitute_symbolized_report(parsed: &mut ParsedReport, record: &BugRecord) {
    parsed.report.clone_from(&record.report);
}
