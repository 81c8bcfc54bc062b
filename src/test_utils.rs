//! Shared test doubles. Kept in the library (like the HTTP mock the rest
//! of this crate's tests use) so integration tests under `tests/` can
//! reuse them.

use crate::http::{HttpClient, HttpRequest, HttpResponse};
use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

enum Scripted {
    Response {
        status: u16,
        body: Vec<u8>,
        delay: Option<Duration>,
    },
    Failure(String),
}

/// Scriptable [`HttpClient`]: responses are queued per `"METHOD /path"`
/// route and handed out in order; every executed request is recorded.
/// A route with no scripted response left fails like a dead network.
#[derive(Default)]
pub struct MockHttpClient {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn route_key(method: &str, path: &str) -> String {
    format!("{method} {path}")
}

/// Strips scheme and host, keeping the path.
fn path_of(url: &str) -> String {
    url.splitn(4, '/')
        .nth(3)
        .map(|p| format!("/{p}"))
        .unwrap_or_else(|| "/".to_string())
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_json(&self, method: &str, path: &str, status: u16, body: &impl serde::Serialize) {
        self.push(
            method,
            path,
            Scripted::Response {
                status,
                body: serde_json::to_vec(body).expect("scripted body serializes"),
                delay: None,
            },
        );
    }

    /// Like [`Self::script_json`] but the response only lands after
    /// `delay`, for tests that need requests overlapping in flight.
    pub fn script_json_delayed(
        &self,
        method: &str,
        path: &str,
        status: u16,
        body: &impl serde::Serialize,
        delay: Duration,
    ) {
        self.push(
            method,
            path,
            Scripted::Response {
                status,
                body: serde_json::to_vec(body).expect("scripted body serializes"),
                delay: Some(delay),
            },
        );
    }

    pub fn script_failure(&self, method: &str, path: &str, message: &str) {
        self.push(method, path, Scripted::Failure(message.to_string()));
    }

    fn push(&self, method: &str, path: &str, scripted: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(route_key(method, path))
            .or_default()
            .push_back(scripted);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, method: &str, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .count()
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = route_key(&request.method, &path_of(&request.url));
        self.requests.lock().unwrap().push(request);

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(Scripted::Response {
                status,
                body,
                delay,
            }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(HttpResponse {
                    status_code: status,
                    body,
                })
            }
            Some(Scripted::Failure(message)) => Err(anyhow::anyhow!("{message}")),
            None => Err(anyhow::anyhow!("no scripted response for {key}")),
        }
    }
}
