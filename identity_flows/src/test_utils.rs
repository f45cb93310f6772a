//! Scripted transport and fixtures shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde_json::{Value, json};
use url::Url;

use crate::api::{ApiRequest, ApiResponse, HttpTransport, TransportError};
use crate::config::DeploymentConfig;

#[derive(Clone)]
enum Reply {
    Response {
        status: StatusCode,
        body: Value,
        delay: Option<Duration>,
    },
    Failure(TransportError),
}

#[derive(Default)]
struct Route {
    replies: VecDeque<Reply>,
    /// The last reply has been returned at least once.
    served: bool,
}

/// Transport answering from replies registered per `(method, path)`.
///
/// Replies registered for a route are returned in order; the last one keeps
/// answering. Registering again after that last reply was served replaces it.
/// Unregistered routes answer 404 with a `NotFound` errors envelope.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<(String, String), Route>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: &str, path: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .entry((method.to_string(), path.to_string()))
            .or_default();
        if route.served && route.replies.len() == 1 {
            route.replies.clear();
        }
        route.served = false;
        route.replies.push_back(reply);
    }

    pub(crate) fn respond(&self, method: &str, path: &str, status: StatusCode, body: Value) {
        self.push(
            method,
            path,
            Reply::Response {
                status,
                body,
                delay: None,
            },
        );
    }

    pub(crate) fn respond_data(&self, method: &str, path: &str, data: Value) {
        self.respond(method, path, StatusCode::OK, json!({ "data": data }));
    }

    pub(crate) fn respond_data_delayed(
        &self,
        method: &str,
        path: &str,
        delay: Duration,
        data: Value,
    ) {
        self.push(
            method,
            path,
            Reply::Response {
                status: StatusCode::OK,
                body: json!({ "data": data }),
                delay: Some(delay),
            },
        );
    }

    pub(crate) fn respond_errors(&self, method: &str, path: &str, code: &str) {
        self.respond(
            method,
            path,
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"errors": [{"code": code, "message": format!("{code} from test")}]}),
        );
    }

    pub(crate) fn fail(&self, method: &str, path: &str, error: TransportError) {
        self.push(method, path, Reply::Failure(error));
    }

    /// Every request received so far, in arrival order.
    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    fn next_reply(&self, method: &str, path: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.get_mut(&(method.to_string(), path.to_string()))?;
        if route.replies.len() > 1 {
            return route.replies.pop_front();
        }
        route.served = true;
        route.replies.front().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let method = request.method.as_str().to_string();
        let path = request.path.clone();
        self.log.lock().unwrap().push(request);

        match self.next_reply(&method, &path) {
            Some(Reply::Response {
                status,
                body,
                delay,
            }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(ApiResponse::new(status, body.to_string()))
            }
            Some(Reply::Failure(error)) => Err(error),
            None => Ok(ApiResponse::new(
                StatusCode::NOT_FOUND,
                json!({"errors": [{"code": "NotFound", "message": format!("{method} {path}")}]})
                    .to_string(),
            )),
        }
    }
}

/// A session payload: `overrides` merged over a signed-out session `sess_1`.
pub(crate) fn session_json(overrides: Value) -> Value {
    let mut session = json!({"id": "sess_1", "signins": []});
    if let (Some(base), Value::Object(extra)) = (session.as_object_mut(), overrides) {
        base.extend(extra);
    }
    session
}

pub(crate) fn test_config() -> DeploymentConfig {
    DeploymentConfig::new(
        Url::parse("https://api.example.test/").unwrap(),
        "accounts.example.test",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, ApiError};

    #[tokio::test]
    async fn test_replies_are_queued_then_sticky() {
        let transport = MockTransport::new();
        transport.respond_data("GET", "session", json!({"n": 1}));
        transport.respond_data("GET", "session", json!({"n": 2}));
        let client = ApiClient::new(transport.clone());

        let mut seen = Vec::new();
        for _ in 0..3 {
            let value: Value = client.send(ApiRequest::get("session")).await.unwrap();
            seen.push(value["n"].as_i64().unwrap());
        }

        assert_eq!(seen, vec![1, 2, 2]);

        // A new registration replaces the served sticky reply
        transport.respond_data("GET", "session", json!({"n": 3}));
        let value: Value = client.send(ApiRequest::get("session")).await.unwrap();
        assert_eq!(value["n"], 3);
    }

    #[tokio::test]
    async fn test_unregistered_route_is_not_found() {
        let transport = MockTransport::new();
        let client = ApiClient::new(transport.clone());

        let result: Result<Value, ApiError> = client.send(ApiRequest::get("nowhere")).await;

        assert!(result.unwrap_err().has_code("NotFound"));
        assert_eq!(transport.calls_to("nowhere"), 1);
    }

    #[test]
    fn test_session_json_merges_overrides() {
        let session = session_json(json!({"id": "sess_2", "active_signin": {"id": "si_1"}}));
        assert_eq!(session["id"], "sess_2");
        assert_eq!(session["signins"], json!([]));
        assert_eq!(session["active_signin"]["id"], "si_1");
    }
}
