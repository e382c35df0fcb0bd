use crate::support::{
    helpers::{init_tracing, open_record},
    mock_dashboard::{MockDashboard, MockDashboardServer, MOCK_CLIENT, MOCK_KEY},
};
use anyhow::Result;
use fillreports::{
    BugId, BugStatus, CrashReference, DashboardError, HttpDashboard, UpdateReportRequest,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_dashboard_round_trips_api_methods() -> Result<()> {
    init_tracing();
    let mut record = open_record("4e0b2f1d", "BUG: KASAN in ext4_xattr fs/ext4/xattr.c:1711\n");
    record.log = "[  12.5] BUG: KASAN: use-after-free\n\u{1b}[0m ümlaut\n".into();
    record.status = BugStatus::Open;
    record.crash_id = CrashReference::new(5_629_499_534_213_120);
    let mut derived = open_record("77aa", "guilty:drivers/a.c");
    derived.guilty_files = Some(vec!["drivers/a.c".into()]);

    let state = MockDashboard::with_bugs(vec![record.clone(), derived.clone()]);
    state.list_missing("deleted");
    let server = MockDashboardServer::start(state.clone()).await?;
    let client = HttpDashboard::new(server.url(), MOCK_CLIENT, MOCK_KEY)?;

    let ids = client.bug_list().await?;
    assert_eq!(
        ids,
        vec![
            BugId::from("4e0b2f1d"),
            BugId::from("77aa"),
            BugId::from("deleted")
        ]
    );

    let loaded = client.load_bug(&record.id).await?;
    assert_eq!(loaded, record);
    assert!(loaded.is_found());

    let loaded = client.load_bug(&derived.id).await?;
    assert!(loaded.has_guilty_files());

    let missing = client.load_bug(&BugId::from("deleted")).await?;
    assert!(!missing.is_found());

    let request = UpdateReportRequest::guilty_files(
        record.id.clone(),
        record.crash_id,
        vec!["fs/ext4/xattr.c".into()],
    );
    client.update_report(&request).await?;
    assert_eq!(state.updates(), vec![request]);
    assert_eq!(state.calls("load_bug"), 3);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_surface_status_errors() -> Result<()> {
    init_tracing();
    let server = MockDashboardServer::start(MockDashboard::default()).await?;
    let client = HttpDashboard::new(server.url(), MOCK_CLIENT, "wrong-key")?;

    let err = client
        .bug_list()
        .await
        .expect_err("wrong key must be rejected");
    match err.downcast_ref::<DashboardError>() {
        Some(DashboardError::Status { method, status, body }) => {
            assert_eq!(*method, "bug_list");
            assert_eq!(*status, 403);
            assert_eq!(body, "unauthorized api request");
        }
        other => panic!("unexpected error {other:?}"),
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failed_update_reports_server_body() -> Result<()> {
    init_tracing();
    let state = MockDashboard::default();
    state.fail_updates();
    let server = MockDashboardServer::start(state.clone()).await?;
    let client = HttpDashboard::new(server.url(), MOCK_CLIENT, MOCK_KEY)?;

    let request =
        UpdateReportRequest::guilty_files(BugId::from("x"), CrashReference::new(1), vec!["a/b.c".into()]);
    let err = client
        .update_report(&request)
        .await
        .expect_err("server failure must surface");
    let message = format!("{err:#}");
    assert!(message.contains("500"), "{message}");
    assert!(message.contains("datastore write failed"), "{message}");
    assert!(state.updates().is_empty());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_dashboard_is_a_transport_error() -> Result<()> {
    init_tracing();
    let server = MockDashboardServer::start(MockDashboard::default()).await?;
    let url = server.url().to_owned();
    server.shutdown().await;

    let client = HttpDashboard::new(url, MOCK_CLIENT, MOCK_KEY)?;
    let err = client
        .load_bug(&BugId::from("abc"))
        .await
        .expect_err("closed listener must fail");
    assert!(matches!(
        err.downcast_ref::<DashboardError>(),
        Some(DashboardError::Transport { method: "load_bug", .. })
    ));
    Ok(())
}
