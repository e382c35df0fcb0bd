//! Concurrent record fetching.
//!
//! A dispatcher task feeds bug IDs into a bounded channel shared by `W` fetch
//! workers. Each worker loads one record at a time and forwards found records
//! into the record channel consumed by the report pipeline. The record channel
//! closes once the dispatcher and every worker have dropped their senders.

use crate::dashboard::{BugId, BugRecord, DashboardClient};
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::progress::DispatchProgress;
use crate::runtime::telemetry::Telemetry;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::select;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const ID_CHANNEL_CAPACITY: usize = 1;

type SharedIds = Arc<Mutex<mpsc::Receiver<BugId>>>;

pub struct FetchPoolParams {
    pub dashboard: Arc<dyn DashboardClient>,
    pub telemetry: Arc<Telemetry>,
    pub thread_count: usize,
    pub log_step: usize,
    pub record_buffer: usize,
}

pub struct RecordFetchPool {
    records: mpsc::Receiver<BugRecord>,
    handles: Vec<JoinHandle<()>>,
}

impl RecordFetchPool {
    /// Spawns the dispatcher and the fetch workers for `ids`.
    pub fn launch(
        params: FetchPoolParams,
        ids: Vec<BugId>,
        run_token: CancellationToken,
        fatal_handler: Arc<FatalErrorHandler>,
    ) -> Self {
        let FetchPoolParams {
            dashboard,
            telemetry,
            thread_count,
            log_step,
            record_buffer,
        } = params;

        let thread_count = thread_count.max(1);
        let (ids_tx, ids_rx) = mpsc::channel(ID_CHANNEL_CAPACITY);
        let (records_tx, records) = mpsc::channel(record_buffer.max(1));
        let shared_ids: SharedIds = Arc::new(Mutex::new(ids_rx));

        let mut handles = Vec::with_capacity(thread_count + 1);
        handles.push(spawn_supervised(
            "dispatcher".to_owned(),
            dispatch(
                DispatchProgress::new(ids.len(), log_step),
                ids,
                ids_tx,
                telemetry.clone(),
                run_token.clone(),
            ),
            fatal_handler.clone(),
        ));

        for worker_id in 0..thread_count {
            let worker = FetchWorker {
                id: worker_id,
                dashboard: dashboard.clone(),
                telemetry: telemetry.clone(),
                ids: shared_ids.clone(),
                records: records_tx.clone(),
                run_token: run_token.clone(),
            };
            handles.push(spawn_supervised(
                format!("fetch worker {worker_id}"),
                worker.run(),
                fatal_handler.clone(),
            ));
        }

        tracing::debug!(workers = thread_count, "record fetch pool launched");

        Self { records, handles }
    }

    /// Next fetched record in completion order, or `None` once every worker has finished.
    pub async fn next_record(&mut self) -> Option<BugRecord> {
        self.records.recv().await
    }

    /// Closes the record stream and waits for the dispatcher and the workers to exit.
    pub async fn join(self) {
        let Self { records, handles } = self;
        drop(records);
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "fetch pool task did not complete cleanly");
            }
        }
    }
}

async fn dispatch(
    mut progress: DispatchProgress,
    ids: Vec<BugId>,
    ids_tx: mpsc::Sender<BugId>,
    telemetry: Arc<Telemetry>,
    run_token: CancellationToken,
) {
    for id in ids {
        if let Some(marker) = progress.record_dispatch() {
            telemetry.record_progress_marker();
            tracing::info!(
                dispatched = marker.dispatched,
                total = marker.total,
                "loaded {}/{}",
                marker.dispatched,
                marker.total
            );
        }

        select! {
            biased;
            _ = run_token.cancelled() => {
                tracing::debug!(dispatched = progress.dispatched(), "dispatch cancelled");
                return;
            }
            sent = ids_tx.send(id) => {
                if sent.is_err() {
                    return;
                }
                telemetry.record_dispatched();
            }
        }
    }
    tracing::debug!(dispatched = progress.dispatched(), "dispatch finished");
}

struct FetchWorker {
    id: usize,
    dashboard: Arc<dyn DashboardClient>,
    telemetry: Arc<Telemetry>,
    ids: SharedIds,
    records: mpsc::Sender<BugRecord>,
    run_token: CancellationToken,
}

impl FetchWorker {
    async fn run(self) {
        while let Some(id) = self.next_id().await {
            let loaded = select! {
                biased;
                _ = self.run_token.cancelled() => break,
                loaded = self.dashboard.load_bug(&id) => loaded,
            };

            let record = match loaded {
                Ok(record) => record,
                Err(err) => {
                    self.telemetry.record_fetch_error();
                    tracing::warn!(
                        worker = self.id,
                        bug = %id,
                        error = %format!("{err:#}"),
                        "failed to load bug"
                    );
                    continue;
                }
            };

            if !record.is_found() {
                self.telemetry.record_not_found();
                tracing::debug!(worker = self.id, bug = %id, "bug not found; dropping");
                continue;
            }

            self.telemetry.record_fetched();
            select! {
                biased;
                _ = self.run_token.cancelled() => break,
                sent = self.records.send(record) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(worker = self.id, "fetch worker finished");
    }

    async fn next_id(&self) -> Option<BugId> {
        let mut ids = self.ids.lock().await;
        select! {
            biased;
            _ = self.run_token.cancelled() => None,
            id = ids.recv() => id,
        }
    }
}

fn spawn_supervised<F>(
    name: String,
    task: F,
    fatal_handler: Arc<FatalErrorHandler>,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let result = std::panic::AssertUnwindSafe(task).catch_unwind().await;
        if let Err(panic_payload) = result {
            let panic_msg = panic_message(panic_payload.as_ref());
            tracing::error!(task = %name, panic = %panic_msg, "fetch pool task panicked");
            let context = format!("{name} panicked");
            fatal_handler.trigger_external(
                context.as_str(),
                anyhow::anyhow!("{name} panicked: {panic_msg}"),
            );
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
