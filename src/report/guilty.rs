//! Guilty file selection over symbolized stack frames.

const SOURCE_EXTENSIONS: &[&str] = &[".c", ".h", ".S", ".rs", ".cc", ".cpp"];

/// Sections after the primary stack describe allocation history, not the crash site.
const STACK_END_MARKERS: &[&str] = &[
    "Allocated by task",
    "Freed by task",
    "The buggy address",
    "Memory state around",
    "Last potentially related work creation",
    "Uninit was created",
    "Uninit was stored",
];

/// Frames inside reporting, sanitizer, and scheduling machinery are never the culprit.
const SKIPPED_PREFIXES: &[&str] = &[
    "include/",
    "mm/kasan/",
    "mm/kmsan/",
    "mm/kfence/",
    "mm/slab.c",
    "mm/slub.c",
    "mm/slab_common.c",
    "kernel/kcsan/",
    "kernel/panic.c",
    "kernel/printk/",
    "kernel/locking/",
    "kernel/rcu/",
    "kernel/sched/",
    "kernel/softirq.c",
    "kernel/time/",
    "kernel/trace/",
    "kernel/entry/",
    "kernel/workqueue.c",
    "kernel/kthread.c",
    "kernel/stacktrace.c",
    "lib/bug.c",
    "lib/dump_stack.c",
    "lib/ubsan.c",
    "lib/refcount.c",
    "lib/list_debug.c",
    "lib/debugobjects.c",
    "arch/x86/entry/",
    "arch/x86/kernel/traps.c",
    "arch/x86/kernel/dumpstack.c",
    "arch/x86/mm/fault.c",
    "arch/arm64/kernel/entry",
    "arch/arm64/kernel/traps.c",
    "arch/arm64/mm/fault.c",
    "kern/kern_shutdown.c",
    "kern/subr_prf.c",
    "kern/subr_witness.c",
    "kern/kern_lock.c",
    "amd64/amd64/trap.c",
    "ddb/",
];

/// Returns the first frame's source file that is not on the skip list.
pub fn extract_guilty_file(report: &str) -> Option<String> {
    for line in report.lines() {
        let line = line.trim();
        if STACK_END_MARKERS
            .iter()
            .any(|marker| line.starts_with(marker))
        {
            break;
        }

        if let Some(path) = source_path(line) {
            if !is_skipped(path) {
                return Some(path.to_owned());
            }
        }
    }
    None
}

/// Extracts `path/to/file.c` from the first `path/to/file.c:LINE` token of `line`.
pub fn source_path(line: &str) -> Option<&str> {
    line.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | ',' | ';'));
        let token = token.strip_prefix("./").unwrap_or(token);
        let (path, location) = token.split_once(':')?;
        let has_line_number = location
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false);

        if !has_line_number || path.starts_with('/') || !path.contains('/') {
            return None;
        }
        if !SOURCE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return None;
        }
        Some(path)
    })
}

fn is_skipped(path: &str) -> bool {
    let relative = path.strip_prefix("sys/").unwrap_or(path);
    SKIPPED_PREFIXES
        .iter()
        .any(|prefix| relative.starts_with(prefix))
}
