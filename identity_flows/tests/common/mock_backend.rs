//! Axum-based stand-in for the identity backend
//!
//! Each test starts its own server on an ephemeral port, so tests never share
//! state and can run in parallel.

use axum::{
    Form, Json, Router,
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::task::JoinHandle;
use url::Url;

/// One-time code the backend accepts.
pub const VALID_CODE: &str = "424242";
/// Password the backend accepts for every account.
pub const VALID_PASSWORD: &str = "correct horse";

type Reply = (StatusCode, Json<Value>);
type Params = Query<HashMap<String, String>>;

/// Server-side state the tests inspect after driving the flows.
#[derive(Debug, Default)]
pub struct BackendState {
    pub signed_in: bool,
    pub active_organization_membership: Option<String>,
    /// `(attempt_identifier, strategy)` of every prepare-verification call.
    pub prepared: Vec<(String, String)>,
    pub code_exchanges: usize,
    /// Fields received by the profile completion endpoint.
    pub completed_fields: HashMap<String, String>,
    /// Dev session tokens seen on session fetches.
    pub dev_tokens: Vec<String>,
    pub hits: HashMap<String, usize>,
}

#[derive(Clone, Default)]
struct Backend {
    state: Arc<Mutex<BackendState>>,
}

impl Backend {
    fn hit(&self, route: &str) -> std::sync::MutexGuard<'_, BackendState> {
        let mut state = self.state.lock().unwrap();
        *state.hits.entry(route.to_string()).or_default() += 1;
        state
    }
}

pub struct MockBackend {
    pub base_url: Url,
    state: Arc<Mutex<BackendState>>,
    task: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let backend = Backend::default();
        let state = backend.state.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");
        let app = create_app(backend);
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                println!("Mock backend error: {e}");
            }
        });

        let base_url = Url::parse(&format!("http://{addr}/v1/")).expect("Invalid base url");
        Self {
            base_url,
            state,
            task,
        }
    }

    pub fn state<R>(&self, read: impl FnOnce(&BackendState) -> R) -> R {
        read(&self.state.lock().unwrap())
    }

    pub fn hits(&self, route: &str) -> usize {
        self.state(|s| s.hits.get(route).copied().unwrap_or(0))
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn create_app(backend: Backend) -> Router {
    Router::new()
        .route("/v1/session", get(session))
        .route("/v1/session/sign-out", post(sign_out))
        .route("/v1/session/switch-organization", put(switch_organization))
        .route("/v1/me/organization-memberships", get(organization_memberships))
        .route("/v1/me/workspace-memberships", get(workspace_memberships))
        .route("/v1/auth/signin", post(signin))
        .route("/v1/auth/prepare-verification", post(prepare_verification))
        .route("/v1/auth/attempt-verification", post(attempt_verification))
        .route("/v1/auth/oauth2/init", post(oauth2_init))
        .route("/v1/auth/oauth2/callback", get(oauth2_callback))
        .route("/v1/auth/oauth2/complete", post(oauth2_complete))
        .with_state(backend)
}

fn data(value: Value) -> Reply {
    (StatusCode::OK, Json(json!({ "data": value })))
}

fn errors(status: StatusCode, code: &str) -> Reply {
    (
        status,
        Json(json!({"errors": [{"code": code, "message": format!("{code} (mock backend)")}]})),
    )
}

fn session_value(state: &BackendState, extra: Value) -> Value {
    let mut session = json!({"id": "sess_1", "signins": []});
    if state.signed_in {
        let signin = json!({
            "id": "si_1",
            "user": {"id": "user_1", "primary_email_address": "ada@example.test"},
            "active_organization_membership_id": state.active_organization_membership,
        });
        session["signins"] = json!([signin.clone()]);
        session["active_signin"] = signin;
    }
    if let (Some(base), Value::Object(extra)) = (session.as_object_mut(), extra) {
        base.extend(extra);
    }
    session
}

async fn session(State(backend): State<Backend>, Query(params): Params) -> Reply {
    let mut state = backend.hit("session");
    if let Some(token) = params.get("__dev_session__") {
        state.dev_tokens.push(token.clone());
    }
    data(session_value(&state, json!({})))
}

async fn sign_out(State(backend): State<Backend>) -> Reply {
    let mut state = backend.hit("sign-out");
    state.signed_in = false;
    state.active_organization_membership = None;
    data(json!({}))
}

async fn switch_organization(State(backend): State<Backend>, Query(params): Params) -> Reply {
    let mut state = backend.hit("switch-organization");
    let membership = match params.get("organization_id").map(String::as_str) {
        Some("org_1") => "om_1",
        Some("org_2") => "om_2",
        _ => return errors(StatusCode::NOT_FOUND, "OrganizationNotFound"),
    };
    state.active_organization_membership = Some(membership.to_string());
    data(json!({}))
}

async fn organization_memberships(State(backend): State<Backend>) -> Reply {
    let _state = backend.hit("organization-memberships");
    data(json!([
        {"id": "om_1", "organization": {"id": "org_1", "name": "Acme"}},
        {"id": "om_2", "organization": {"id": "org_2", "name": "Globex"}}
    ]))
}

async fn workspace_memberships(State(backend): State<Backend>) -> Reply {
    let _state = backend.hit("workspace-memberships");
    data(json!([]))
}

async fn signin(
    State(backend): State<Backend>,
    Form(form): Form<HashMap<String, String>>,
) -> Reply {
    let mut state = backend.hit("signin");
    match form.get("strategy").map(String::as_str) {
        Some("email_password") => {
            if form.get("password").map(String::as_str) != Some(VALID_PASSWORD) {
                return errors(StatusCode::UNPROCESSABLE_ENTITY, "InvalidCredentials");
            }
            state.signed_in = true;
            let attempts = json!({"signin_attempts": [{"id": "att_pw", "completed": true}]});
            data(session_value(&state, attempts))
        }
        Some("email_otp") => data(session_value(
            &state,
            json!({"signin_attempts": [{
                "id": "att_otp",
                "email": form.get("identifier"),
                "current_step": "verify_email_otp"
            }]}),
        )),
        _ => errors(StatusCode::BAD_REQUEST, "UnsupportedStrategy"),
    }
}

async fn prepare_verification(State(backend): State<Backend>, Query(params): Params) -> Reply {
    let mut state = backend.hit("prepare-verification");
    let attempt = params.get("attempt_identifier").cloned().unwrap_or_default();
    let strategy = params.get("strategy").cloned().unwrap_or_default();
    state.prepared.push((attempt, strategy));
    data(json!({}))
}

async fn attempt_verification(
    State(backend): State<Backend>,
    Query(params): Params,
    Json(body): Json<Value>,
) -> Reply {
    let mut state = backend.hit("attempt-verification");
    if body["verification_code"] != VALID_CODE {
        return errors(StatusCode::UNPROCESSABLE_ENTITY, "InvalidVerificationCode");
    }
    state.signed_in = true;
    let attempt = params.get("attempt_identifier").cloned().unwrap_or_default();
    data(session_value(
        &state,
        json!({"signin_attempts": [{"id": attempt, "completed": true}]}),
    ))
}

async fn oauth2_init(State(backend): State<Backend>, Query(params): Params) -> Reply {
    let _state = backend.hit("oauth2-init");
    let provider = params.get("provider").cloned().unwrap_or_default();
    data(json!({
        "oauth_url": format!("https://{provider}.provider.test/authorize?state=st_1")
    }))
}

async fn oauth2_callback(State(backend): State<Backend>, Query(params): Params) -> Reply {
    let mut state = backend.hit("oauth2-callback");
    state.code_exchanges += 1;
    if params.get("state").map(String::as_str) != Some("st_1") {
        return errors(StatusCode::BAD_REQUEST, "OAuthStateMismatch");
    }
    let session = session_value(
        &state,
        json!({"signup_attempts": [{
            "id": "sua_1",
            "email": "ada@example.test",
            "missing_fields": ["username"]
        }]}),
    );
    data(json!({"session": session, "redirect_uri": "https://app.example.test/home"}))
}

async fn oauth2_complete(
    State(backend): State<Backend>,
    Query(params): Params,
    mut multipart: Multipart,
) -> Reply {
    let mut fields = HashMap::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.unwrap_or_default();
        fields.insert(name, value);
    }

    let mut state = backend.hit("oauth2-complete");
    if params.get("attempt_id").map(String::as_str) != Some("sua_1") {
        return errors(StatusCode::NOT_FOUND, "AttemptNotFound");
    }
    state.completed_fields = fields;
    state.signed_in = true;
    data(session_value(
        &state,
        json!({"signup_attempts": [{"id": "sua_1", "completed": true}]}),
    ))
}
