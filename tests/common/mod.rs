//! In-process HTTP file store used by the integration tests.
//!
//! Serves any number of named stores under `/<store>/files` on one axum
//! server running on its own tokio runtime thread, so tests can drive the
//! blocking client from plain `#[test]` functions.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::oneshot;

#[derive(Default)]
struct StoreState {
    files: HashMap<String, Vec<(String, Vec<u8>)>>,
    unavailable: HashSet<String>,
    fail_delete: HashSet<(String, String)>,
    // remaining 503 replies per (method, store, name)
    flaky: HashMap<(String, String, String), usize>,
    hits: HashMap<(String, String, String), usize>,
    upload_names: Vec<String>,
}

type Shared = Arc<Mutex<StoreState>>;

fn lock(state: &Shared) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// Count the request and tell whether it should be answered with 503.
fn hit(st: &mut StoreState, method: &str, store: &str, name: &str) -> bool {
    let key = (method.to_string(), store.to_string(), name.to_string());
    *st.hits.entry(key.clone()).or_default() += 1;
    match st.flaky.get_mut(&key) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

async fn list(State(state): State<Shared>, Path(store): Path<String>) -> Response {
    let mut st = lock(&state);
    if hit(&mut st, "GET", &store, "") || st.unavailable.contains(&store) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let names: Vec<String> = st
        .files
        .get(&store)
        .map(|fs| fs.iter().map(|(n, _)| n.clone()).collect())
        .unwrap_or_default();
    Json(names).into_response()
}

async fn get_file(
    State(state): State<Shared>,
    Path((store, name)): Path<(String, String)>,
) -> Response {
    let mut st = lock(&state);
    if hit(&mut st, "GET", &store, &name) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let found = st
        .files
        .get(&store)
        .and_then(|fs| fs.iter().find(|(n, _)| *n == name))
        .map(|(_, data)| data.clone());
    match found {
        Some(data) => (StatusCode::OK, data).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn upload(
    State(state): State<Shared>,
    Path(store): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut received: Option<(String, Vec<u8>)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(String::from) else {
            return (StatusCode::BAD_REQUEST, "file name required").into_response();
        };
        match field.bytes().await {
            Ok(b) => received = Some((file_name, b.to_vec())),
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        }
    }
    let Some((name, data)) = received else {
        return (StatusCode::BAD_REQUEST, "file is required").into_response();
    };
    let mut st = lock(&state);
    if hit(&mut st, "POST", &store, &name) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    st.upload_names.push(name.clone());
    let files = st.files.entry(store).or_default();
    files.retain(|(n, _)| *n != name);
    files.push((name, data));
    (StatusCode::OK, "stored").into_response()
}

async fn delete_file(
    State(state): State<Shared>,
    Path((store, name)): Path<(String, String)>,
) -> Response {
    let mut st = lock(&state);
    if hit(&mut st, "DELETE", &store, &name) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if st.fail_delete.contains(&(store.clone(), name.clone())) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let Some(files) = st.files.get_mut(&store) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let before = files.len();
    files.retain(|(n, _)| *n != name);
    if files.len() < before {
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

pub struct MockStore {
    addr: SocketAddr,
    state: Shared,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MockStore {
    pub fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(StoreState::default()));
        let app = Router::new()
            .route("/{store}/files", get(list).post(upload))
            .route("/{store}/files/{name}", get(get_file).delete(delete_file))
            .layer(DefaultBodyLimit::max(64 * 1024 * 1024))
            .with_state(state.clone());

        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("tokio runtime");
            rt.block_on(async move {
                let listener =
                    tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock store");
                addr_tx.send(listener.local_addr().expect("local addr")).expect("send addr");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("serve mock store");
            });
        });
        let addr = addr_rx.recv().expect("mock store address");
        Self { addr, state, shutdown: Some(shutdown_tx), thread: Some(thread) }
    }

    /// Base url of `store`, e.g. `http://127.0.0.1:port/oldStorage`.
    pub fn url(&self, store: &str) -> String {
        format!("http://{}/{}", self.addr, store)
    }

    pub fn put(&self, store: &str, name: &str, data: &[u8]) {
        lock(&self.state)
            .files
            .entry(store.to_string())
            .or_default()
            .push((name.to_string(), data.to_vec()));
    }

    pub fn content(&self, store: &str, name: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .files
            .get(store)
            .and_then(|fs| fs.iter().find(|(n, _)| n == name))
            .map(|(_, d)| d.clone())
    }

    pub fn names(&self, store: &str) -> Vec<String> {
        lock(&self.state)
            .files
            .get(store)
            .map(|fs| fs.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    pub fn make_unavailable(&self, store: &str) {
        lock(&self.state).unavailable.insert(store.to_string());
    }

    pub fn fail_delete(&self, store: &str, name: &str) {
        lock(&self.state).fail_delete.insert((store.to_string(), name.to_string()));
    }

    /// Answer the next `times` `method` requests for `name` with 503.
    /// An empty `name` targets the list endpoint.
    pub fn flaky(&self, method: &str, store: &str, name: &str, times: usize) {
        let key = (method.to_string(), store.to_string(), name.to_string());
        lock(&self.state).flaky.insert(key, times);
    }

    pub fn hits(&self, method: &str, store: &str, name: &str) -> usize {
        let key = (method.to_string(), store.to_string(), name.to_string());
        lock(&self.state).hits.get(&key).copied().unwrap_or(0)
    }

    pub fn upload_names(&self) -> Vec<String> {
        lock(&self.state).upload_names.clone()
    }
}

impl Drop for MockStore {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}
