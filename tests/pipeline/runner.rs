use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    helpers::{init_tracing, open_record, RecordingDashboard, ScriptedFactory},
    mock_dashboard::{MockDashboard, MockDashboardServer, MOCK_CLIENT, MOCK_KEY},
};
use anyhow::{Context, Result};
use fillreports::{BugId, BugRecord, BugStatus, CrashReference, FillConfig, Runner};
use tokio::time::timeout;

const KASAN_LOG: &str = "\
[   10.100000][ T5120] executing program 0:
[   10.200000][ T5120] ==================================================================
[   10.200001][ T5120] BUG: KASAN: use-after-free in ext4_xattr_set_entry+0x1a2/0x3b0
[   10.200002][ T5120] Read of size 4 at addr ffff88801d4a5c40 by task syz-executor.0/5120
";

const KASAN_REPORT: &str = "\
BUG: KASAN: use-after-free in ext4_xattr_set_entry+0x1a2/0x3b0 fs/ext4/xattr.c:1711
Read of size 4 at addr ffff88801d4a5c40 by task syz-executor.0/5120

Call Trace:
 <TASK>
 __dump_stack lib/dump_stack.c:88 [inline]
 dump_stack_lvl+0xd9/0x1b0 lib/dump_stack.c:106
 kasan_report+0xd9/0x110 mm/kasan/report.c:491
 ext4_xattr_set_entry+0x1a2/0x3b0 fs/ext4/xattr.c:1711
 </TASK>
";

const WARNING_LOG: &str = "\
[   33.000000][    C1] WARNING: CPU: 1 PID: 42 at net/core/dev.c:3300 skb_warn_bad_offload+0x1/0x2
";

const WARNING_REPORT: &str = "\
WARNING: CPU: 1 PID: 42 at kernel/locking/lockdep.c:100 lock_acquire+0x1/0x2
Call Trace:
 lock_acquire+0x1/0x2 kernel/locking/lockdep.c:5754
 __dev_queue_xmit+0x1/0x2 net/core/dev.c:4300
";

fn kernel_record(id: &str, log: &str, report: &str) -> BugRecord {
    BugRecord {
        id: BugId::from(id),
        os: "linux".into(),
        arch: "amd64".into(),
        log: log.into(),
        report: report.into(),
        status: BugStatus::Open,
        guilty_files: None,
        crash_id: CrashReference::new(77),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runner_fills_guilty_files_over_http() -> Result<()> {
    init_tracing();
    let mut fixed = kernel_record("fixed", KASAN_LOG, KASAN_REPORT);
    fixed.status = BugStatus::Fixed;
    let state = MockDashboard::with_bugs(vec![
        kernel_record("kasan", KASAN_LOG, KASAN_REPORT),
        kernel_record("warning", WARNING_LOG, WARNING_REPORT),
        kernel_record("clean", "[    1.0] random: crng init done\n", ""),
        fixed,
    ]);
    state.list_missing("deleted");
    let server = MockDashboardServer::start(state.clone()).await?;

    let config = FillConfig::builder()
        .dashboard_url(server.url())
        .client(MOCK_CLIENT)
        .key(MOCK_KEY)
        .thread_count(3)
        .log_step(2)
        .build()?;
    let runner = Runner::from_config(config)?;

    let summary = timeout(Duration::from_secs(30), runner.run())
        .await
        .context("runner did not finish")??;

    let mut updates: Vec<(String, Vec<String>)> = state
        .updates()
        .into_iter()
        .map(|update| {
            assert_eq!(update.crash_id, CrashReference::new(77));
            (
                update.bug_id.as_str().to_owned(),
                update.guilty_files.unwrap_or_default(),
            )
        })
        .collect();
    updates.sort();
    assert_eq!(
        updates,
        vec![
            ("kasan".to_owned(), vec!["fs/ext4/xattr.c".to_owned()]),
            ("warning".to_owned(), vec!["net/core/dev.c".to_owned()]),
        ]
    );

    assert_eq!(summary.listed, 5);
    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.progress_markers, 3);
    assert_eq!(state.calls("load_bug"), 5);
    assert_eq!(runner.telemetry().snapshot().updated, 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn runner_reports_cancelled_runs_as_interrupted() -> Result<()> {
    init_tracing();
    let dashboard = Arc::new(RecordingDashboard::with_bugs(vec![open_record(
        "a",
        "guilty:drivers/a.c",
    )]));
    let config = FillConfig::builder()
        .dashboard_url("http://dashboard.invalid")
        .client("ci")
        .key("secret")
        .build()?;
    let runner = Runner::new(config, dashboard.clone(), Arc::new(ScriptedFactory::default()));

    runner.cancellation_token().cancel();
    let summary = runner.run().await?;

    assert!(summary.interrupted);
    assert_eq!(summary.updated, 0);
    assert!(dashboard.loads().is_empty());
    Ok(())
}

#[tokio::test]
async fn runner_surfaces_fatal_errors() -> Result<()> {
    init_tracing();
    let dashboard = Arc::new(RecordingDashboard::failing_list());
    let config = FillConfig::builder()
        .dashboard_url("http://dashboard.invalid")
        .client("ci")
        .key("secret")
        .build()?;
    let runner = Runner::new(config, dashboard, Arc::new(ScriptedFactory::default()));
    let token = runner.cancellation_token();

    let err = runner
        .run_until_ctrl_c()
        .await
        .expect_err("bug list failure must abort");
    assert!(format!("{err:#}").contains("bug list query failed"));
    assert!(token.is_cancelled());
    Ok(())
}
