use std::sync::MutexGuard;

use tokio::net::TcpListener;

use crate::state::{new_state, AppState, MockBackend, RecordedRequest};

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    _handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub fn backend(&self) -> MutexGuard<'_, MockBackend> {
        self.state.backend.lock().unwrap()
    }

    /// Requests seen so far, as `(method, path)`.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.requests.lock().unwrap().clear();
    }
}

/// Spawn an axum test server on a random port, seeded with the `admin` and
/// `alice` accounts. Returns the TestServer with the `base_url`
/// (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    spawn_test_server_with(MockBackend::seeded()).await
}

pub async fn spawn_test_server_with(backend: MockBackend) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let state = new_state(backend);
    let app = crate::build_router(state.clone());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        state,
        _handle: Some(handle),
    }
}

/// Spawn a test server on a background thread with its own runtime, for
/// callers that block on their own runtime (the blocking client, the TUI).
/// The server stays alive for the rest of the process.
pub fn spawn_test_server_thread() -> TestServer {
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let server = spawn_test_server().await;
            tx.send((server.base_url.clone(), server.state.clone()))
                .unwrap();
            std::future::pending::<()>().await;
        });
    });
    let (base_url, state) = rx.recv().unwrap();
    TestServer {
        base_url,
        state,
        _handle: None,
    }
}
