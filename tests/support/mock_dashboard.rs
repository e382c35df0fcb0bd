use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, RwLock},
};

use anyhow::{Context, Result};
use fillreports::dashboard::payload::{decode_form, decompress_json};
use fillreports::dashboard::types::{BugListResponse, BugReportWire, LoadBugRequest};
use fillreports::{BugId, BugRecord, UpdateReportRequest};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const MOCK_CLIENT: &str = "ci-bot";
pub const MOCK_KEY: &str = "s3cr3t&key=1";

/// In-memory dashboard state served over the `/api` form protocol.
#[derive(Clone, Default)]
pub struct MockDashboard {
    inner: Arc<RwLock<MockDashboardInner>>,
}

#[derive(Default)]
struct MockDashboardInner {
    list: Vec<BugId>,
    bugs: HashMap<BugId, BugRecord>,
    updates: Vec<UpdateReportRequest>,
    calls: Vec<String>,
    fail_updates: bool,
}

impl MockDashboard {
    pub fn with_bugs(records: Vec<BugRecord>) -> Self {
        let dashboard = Self::default();
        {
            let mut inner = dashboard.inner.write().expect("mock dashboard poisoned");
            for record in records {
                inner.list.push(record.id.clone());
                inner.bugs.insert(record.id.clone(), record);
            }
        }
        dashboard
    }

    /// Lists `id` without storing a record for it, so `load_bug` answers with an empty report.
    pub fn list_missing(&self, id: impl Into<BugId>) {
        let mut inner = self.inner.write().expect("mock dashboard poisoned");
        inner.list.push(id.into());
    }

    pub fn fail_updates(&self) {
        self.inner.write().expect("mock dashboard poisoned").fail_updates = true;
    }

    pub fn updates(&self) -> Vec<UpdateReportRequest> {
        self.inner
            .read()
            .expect("mock dashboard poisoned")
            .updates
            .clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.inner
            .read()
            .expect("mock dashboard poisoned")
            .calls
            .iter()
            .filter(|call| call.as_str() == method)
            .count()
    }

    fn handle(&self, method: &str, payload: Option<&[u8]>) -> Result<(StatusCode, Vec<u8>)> {
        let mut inner = self.inner.write().expect("mock dashboard poisoned");
        inner.calls.push(method.to_owned());

        match method {
            "bug_list" => {
                let response = BugListResponse {
                    list: inner.list.clone(),
                };
                Ok((StatusCode::OK, serde_json::to_vec(&response)?))
            }
            "load_bug" => {
                let request: LoadBugRequest =
                    decompress_json(payload.context("load_bug without payload")?)?;
                let wire = inner
                    .bugs
                    .get(&request.id)
                    .map(BugReportWire::from)
                    .unwrap_or_default();
                Ok((StatusCode::OK, serde_json::to_vec(&wire)?))
            }
            "update_report" => {
                let request: UpdateReportRequest =
                    decompress_json(payload.context("update_report without payload")?)?;
                if inner.fail_updates {
                    return Ok((
                        StatusCode::INTERNAL_SERVER_ERROR,
                        b"datastore write failed".to_vec(),
                    ));
                }
                inner.updates.push(request);
                Ok((StatusCode::OK, b"null".to_vec()))
            }
            other => Ok((
                StatusCode::BAD_REQUEST,
                format!("unknown api method {other:?}").into_bytes(),
            )),
        }
    }
}

pub struct MockDashboardServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockDashboardServer {
    pub async fn start(dashboard: MockDashboard) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock dashboard listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let dashboard = dashboard.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(dashboard.clone(), req)))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock dashboard server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn text_response(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

async fn serve_request(
    dashboard: MockDashboard,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::POST || req.uri().path() != "/api" {
        return Ok(text_response(StatusCode::NOT_FOUND, "Not found"));
    }

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                format!("failed to read body: {err}"),
            ))
        }
    };

    let fields: HashMap<String, Vec<u8>> = match decode_form(&bytes) {
        Ok(fields) => fields.into_iter().collect(),
        Err(err) => {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                format!("invalid form: {err}"),
            ))
        }
    };

    let field = |name: &str| fields.get(name).map(|value| value.as_slice());
    if field("client") != Some(MOCK_CLIENT.as_bytes()) || field("key") != Some(MOCK_KEY.as_bytes())
    {
        return Ok(text_response(StatusCode::FORBIDDEN, "unauthorized api request"));
    }

    let method = String::from_utf8_lossy(field("method").unwrap_or_default()).into_owned();
    match dashboard.handle(&method, field("payload")) {
        Ok((status, body)) => {
            let mut response = text_response(status, body);
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            Ok(response)
        }
        Err(err) => Ok(text_response(
            StatusCode::BAD_REQUEST,
            format!("{method}: {err:#}"),
        )),
    }
}
