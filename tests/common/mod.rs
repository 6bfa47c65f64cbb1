// In-process mock of the portfolio backend, bound to an ephemeral localhost port.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, RawQuery, State};
use axum::http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use portfolio_admin::session::{SessionStore, UserRole};
use portfolio_admin::{ApiClient, ClientConfig};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin12345";

#[derive(Default)]
pub struct MockBackend {
    access: Mutex<HashSet<String>>,
    refresh: Mutex<HashSet<String>>,
    seq: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    pub refresh_delay_ms: AtomicU64,
    pub fail_refresh: AtomicBool,
    /// Reject every resource call with 401, even with a freshly issued token.
    pub reject_all: AtomicBool,
    pub last_activity_query: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn grant_access(&self, token: &str) { self.access.lock().insert(token.to_string()); }

    pub fn grant_refresh(&self, token: &str) { self.refresh.lock().insert(token.to_string()); }

    pub fn revoke_all_access(&self) { self.access.lock().clear(); }

    pub fn refresh_calls(&self) -> usize { self.refresh_calls.load(Ordering::SeqCst) }

    pub fn resource_calls(&self) -> usize { self.resource_calls.load(Ordering::SeqCst) }

    fn issue_pair(&self) -> Value {
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{}", n);
        let refresh = format!("refresh-{}", n);
        self.grant_access(&access);
        self.grant_refresh(&refresh);
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer",
            "role": "admin",
            "org_id": 1,
            "user_id": 1,
        })
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_all.load(Ordering::SeqCst) {
            return false;
        }
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| self.access.lock().contains(t))
            .unwrap_or(false)
    }
}

type Shared = Arc<MockBackend>;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"}))).into_response()
}

async fn login(State(s): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let ok = form.get("username").map(String::as_str) == Some(ADMIN_EMAIL)
        && form.get("password").map(String::as_str) == Some(ADMIN_PASSWORD);
    if !ok {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Incorrect email or password"}))).into_response();
    }
    Json(s.issue_pair()).into_response()
}

async fn refresh(State(s): State<Shared>, Json(body): Json<Value>) -> Response {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = s.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let presented = body.get("refresh_token").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let known = s.refresh.lock().remove(&presented);
    if s.fail_refresh.load(Ordering::SeqCst) || !known {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid refresh token"}))).into_response();
    }
    Json(s.issue_pair()).into_response()
}

fn project(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "A project",
        "github_url": null,
        "is_public": true,
        "owner_id": 1,
        "tags": [{"id": 1, "name": "rust"}],
    })
}

async fn list_projects(State(s): State<Shared>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    Json(json!([project(1, "Portfolio"), project(2, "Gateway")])).into_response()
}

async fn get_project(State(s): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    if id == 404 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Resource not found"}))).into_response();
    }
    Json(project(id, "Portfolio")).into_response()
}

async fn create_project(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    let mut p = project(7, body["title"].as_str().unwrap_or(""));
    p["is_public"] = body["is_public"].clone();
    let tags: Vec<Value> = body["tag_ids"]
        .as_array()
        .map(|ids| ids.iter().map(|id| json!({"id": id, "name": format!("tag-{}", id)})).collect())
        .unwrap_or_default();
    p["tags"] = Value::Array(tags);
    (StatusCode::CREATED, Json(p)).into_response()
}

async fn update_project(State(s): State<Shared>, headers: HeaderMap, Path(id): Path<i64>, Json(body): Json<Value>) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    Json(project(id, body["title"].as_str().unwrap_or(""))).into_response()
}

async fn delete_by_id(State(s): State<Shared>, headers: HeaderMap, Path(_id): Path<i64>) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_tags(State(s): State<Shared>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    Json(json!([{"id": 1, "name": "rust"}, {"id": 2, "name": "react"}])).into_response()
}

async fn create_tag(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    (StatusCode::CREATED, Json(json!({"id": 3, "name": body["name"]}))).into_response()
}

async fn update_tag(State(s): State<Shared>, headers: HeaderMap, Path(id): Path<i64>, Json(body): Json<Value>) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    Json(json!({"id": id, "name": body["name"]})).into_response()
}

async fn list_users(State(s): State<Shared>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    Json(json!([
        {"id": 1, "email": ADMIN_EMAIL, "role": "admin", "org_id": 1},
        {"id": 2, "email": "viewer@example.com", "role": "viewer", "org_id": "1"},
    ]))
    .into_response()
}

async fn create_user(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    if body["email"] == "dup@example.com" {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Email already registered"}))).into_response();
    }
    (StatusCode::CREATED, Json(json!({"id": 3, "email": body["email"], "role": body["role"], "org_id": 1}))).into_response()
}

async fn list_activity(State(s): State<Shared>, headers: HeaderMap, RawQuery(q): RawQuery) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    *s.last_activity_query.lock() = q;
    Json(json!([
        {"id": 30, "action": "project.update", "entity": "project", "entity_id": 2, "actor_user_id": 1, "created_at": "2025-01-01T12:00:00Z", "meta": {"field": "title"}},
        {"id": 29, "action": "tag.create", "entity": "tag", "entity_id": 3, "actor_user_id": 1, "created_at": "2025-01-01T11:00:00"},
        {"id": 28, "action": "project.delete", "entity": "project", "entity_id": 5, "actor_user_id": null, "created_at": "2025-01-01T10:00:00Z"},
    ]))
    .into_response()
}

async fn forbidden(State(s): State<Shared>, headers: HeaderMap) -> Response {
    if !s.authorized(&headers) { return unauthorized(); }
    StatusCode::FORBIDDEN.into_response()
}

async fn plain() -> Response {
    (StatusCode::OK, "pong").into_response()
}

async fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

// Reports what the client sent.
async fn echo(headers: HeaderMap, body: String) -> Response {
    let h = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "content_type": h(CONTENT_TYPE),
        "authorization": h(AUTHORIZATION),
        "body": body,
    }))
    .into_response()
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/{id}", get(get_project).put(update_project).delete(delete_by_id))
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/{id}", put(update_tag).delete(delete_by_id))
        .route("/users", get(list_users).post(create_user))
        .route("/activity", get(list_activity))
        .route("/forbidden", get(forbidden))
        .route("/plain", get(plain))
        .route("/no-content", get(no_content))
        .route("/echo", post(echo))
        .with_state(state)
}

// Aborts the server task on drop.
pub struct Guard(JoinHandle<()>);
impl Drop for Guard { fn drop(&mut self) { self.0.abort(); } }

pub struct TestServer {
    pub backend: Arc<MockBackend>,
    pub base_url: String,
    _guard: Guard,
}

impl TestServer {
    pub fn client(&self) -> ApiClient {
        self.client_with(Arc::new(SessionStore::in_memory()))
    }

    pub fn client_with(&self, session: Arc<SessionStore>) -> ApiClient {
        client_at(&self.base_url, session)
    }
}

pub fn client_at(base_url: &str, session: Arc<SessionStore>) -> ApiClient {
    let cfg = ClientConfig::new(base_url).expect("config").with_timeout(Duration::from_secs(10));
    ApiClient::new(cfg, session).expect("client")
}

/// Base URL of a localhost port that nothing is listening on.
pub async fn closed_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

pub async fn start() -> TestServer {
    let backend = Arc::new(MockBackend::default());
    let app = router(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("mock backend task error: {e:?}");
        }
    });
    TestServer { backend, base_url: format!("http://{}", addr), _guard: Guard(handle) }
}

/// Put a session in the store as if a previous login had happened.
pub fn seed(client: &ApiClient, access: &str, refresh: &str) {
    client.session().set(access, refresh, UserRole::Admin, Some("1"), Some(1)).expect("seed session");
}
