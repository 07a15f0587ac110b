use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ecm_api::ApiClient;
use ecm_core::backend::{AuthBackend, Credentials, InstanceBackend};
use ecm_core::error::ConsoleError;
use ecm_core::model::{CreateInstanceParams, InstanceState, User};
use ecm_core::session::{AuthSession, AuthStatus};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

impl Recorder {
    fn record(&self, route: String, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push((route, auth, body));
    }

    fn requests(&self) -> Vec<(String, Option<String>, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

fn instance_json(id: &str, state: &str) -> Value {
    json!({
        "id": id,
        "name": format!("{id}-box"),
        "instanceType": "t3.large",
        "region": "ap-northeast-1",
        "state": state,
        "publicIp": "203.0.113.10",
        "createdAt": "2025-03-01T09:00:00Z",
        "updatedAt": "2025-03-01T09:05:00Z"
    })
}

async fn list(State(rec): State<Recorder>, headers: HeaderMap) -> Json<Value> {
    rec.record("GET /instances".to_string(), &headers, Value::Null);
    Json(json!({ "instances": [instance_json("i-1", "running"), instance_json("i-2", "rebooting")] }))
}

async fn show(State(rec): State<Recorder>, Path(id): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    rec.record(format!("GET /instances/{id}"), &headers, Value::Null);
    if id == "i-missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Instance not found" }))).into_response();
    }
    if id == "i-garbled" {
        return (StatusCode::OK, "<html>oops</html>").into_response();
    }
    Json(json!({ "instance": instance_json(&id, "stopped") })).into_response()
}

async fn create(State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    rec.record("POST /instances".to_string(), &headers, body.clone());
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut created = instance_json("i-new", "pending");
    created["name"] = Value::String(name);
    (StatusCode::CREATED, Json(json!({ "instance": created })))
}

async fn action(
    State(rec): State<Recorder>,
    Path((id, verb)): Path<(String, String)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    rec.record(format!("POST /instances/{id}/{verb}"), &headers, Value::Null);
    if verb == "start" && id == "i-busy" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "インスタンスは既に起動処理中です" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn associate(State(rec): State<Recorder>, Path(id): Path<String>, headers: HeaderMap) -> Json<Value> {
    rec.record(format!("POST /instances/{id}/elastic-ip/associate"), &headers, Value::Null);
    let mut bound = instance_json(&id, "running");
    bound["elasticIP"] = json!({
        "allocationId": "eipalloc-1",
        "publicIp": "198.51.100.7",
        "associationId": "eipassoc-1"
    });
    Json(json!({ "instance": bound }))
}

async fn disassociate(
    State(rec): State<Recorder>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    rec.record(format!("POST /instances/{id}/elastic-ip/disassociate"), &headers, body);
    Json(json!({ "instance": instance_json(&id, "running") }))
}

async fn login(State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    rec.record("POST /auth/login".to_string(), &headers, body.clone());
    if body["password"] != "secret1" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "メールアドレスまたはパスワードが正しくありません" })),
        )
            .into_response();
    }
    Json(json!({
        "user": { "id": 7, "username": "dev", "email": body["email"] },
        "token": "tok-fresh"
    }))
    .into_response()
}

async fn me(State(rec): State<Recorder>, headers: HeaderMap) -> impl IntoResponse {
    rec.record("GET /auth/me".to_string(), &headers, Value::Null);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer tok-good") => Json(json!({
            "user": { "id": 7, "username": "dev", "email": "dev@example.com", "createdAt": "2025-01-01T00:00:00Z" }
        }))
        .into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid token" }))).into_response(),
    }
}

async fn spawn_backend() -> (String, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/api/instances", get(list).post(create))
        .route("/api/instances/:id", get(show))
        .route("/api/instances/:id/elastic-ip/associate", post(associate))
        .route("/api/instances/:id/elastic-ip/disassociate", post(disassociate))
        .route("/api/instances/:id/:verb", post(action))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .with_state(recorder.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/api", addr), recorder)
}

fn logged_in(token: &str) -> Arc<AuthSession> {
    let session = AuthSession::in_memory();
    session
        .store(Credentials {
            user: User {
                id: 7,
                username: "dev".to_string(),
                email: "dev@example.com".to_string(),
                created_at: None,
            },
            token: token.to_string(),
        })
        .unwrap();
    Arc::new(session)
}

#[tokio::test]
async fn test_list_sends_bearer_token_and_unwraps_envelope() {
    let (url, recorder) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    let instances = client.list_instances().await.unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].state, InstanceState::Running);
    assert_eq!(instances[1].state, InstanceState::Other("rebooting".to_string()));

    let requests = recorder.requests();
    assert_eq!(requests[0].0, "GET /instances");
    assert_eq!(requests[0].1.as_deref(), Some("Bearer tok-good"));
}

#[tokio::test]
async fn test_logged_out_requests_carry_no_token() {
    let (url, recorder) = spawn_backend().await;
    let client = ApiClient::new(url, Arc::new(AuthSession::in_memory()));

    client.get_instance("i-1").await.unwrap();
    assert_eq!(recorder.requests()[0].1, None);
}

#[tokio::test]
async fn test_lifecycle_routes() {
    let (url, recorder) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    client.start_instance("i-1").await.unwrap();
    client.stop_instance("i-1").await.unwrap();
    client.terminate_instance("i-1").await.unwrap();

    let routes: Vec<String> = recorder.requests().into_iter().map(|r| r.0).collect();
    assert_eq!(
        routes,
        vec![
            "POST /instances/i-1/start",
            "POST /instances/i-1/stop",
            "POST /instances/i-1/terminate",
        ]
    );
}

#[tokio::test]
async fn test_ids_are_escaped_in_paths() {
    let (url, recorder) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    let instance = client.get_instance("odd/id?x").await.unwrap();
    assert_eq!(instance.id, "odd/id?x");
    client.stop_instance("odd/id").await.unwrap();

    let routes: Vec<String> = recorder.requests().into_iter().map(|r| r.0).collect();
    assert_eq!(routes, vec!["GET /instances/odd/id?x", "POST /instances/odd/id/stop"]);
}

#[tokio::test]
async fn test_malformed_base_url_is_config_error() {
    let client = ApiClient::new("not a url", logged_in("tok-good"));
    let err = client.list_instances().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Config(_)));
}

#[tokio::test]
async fn test_create_posts_params() {
    let (url, recorder) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    let created = client
        .create_instance(&CreateInstanceParams::new("dev-box"))
        .await
        .unwrap();
    assert_eq!(created.id, "i-new");
    assert_eq!(created.name, "dev-box");
    assert_eq!(created.state, InstanceState::Pending);

    let body = &recorder.requests()[0].2;
    assert_eq!(body["instanceType"], "t3.large");
    assert_eq!(body["region"], "ap-northeast-1");
    assert_eq!(body["elasticIP"], true);
}

#[tokio::test]
async fn test_elastic_ip_round_trip() {
    let (url, recorder) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    let bound = client.associate_elastic_ip("i-1").await.unwrap();
    assert_eq!(bound.bound_allocation(), Some("eipalloc-1"));
    assert_eq!(bound.access_ip(), Some("198.51.100.7"));

    let unbound = client.disassociate_elastic_ip("i-1", "eipalloc-1").await.unwrap();
    assert!(unbound.elastic_ip.is_none());

    let requests = recorder.requests();
    assert_eq!(requests[1].0, "POST /instances/i-1/elastic-ip/disassociate");
    assert_eq!(requests[1].2, json!({ "allocationId": "eipalloc-1" }));
}

#[tokio::test]
async fn test_backend_message_is_kept() {
    let (url, _) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    match client.start_instance("i-busy").await.unwrap_err() {
        ConsoleError::Backend { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "インスタンスは既に起動処理中です");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    match client.get_instance("i-missing").await.unwrap_err() {
        ConsoleError::Backend { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Instance not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_invalid_response() {
    let (url, _) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    let err = client.get_instance("i-garbled").await.unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(format!("http://{}/api", addr), logged_in("tok-good"));
    let err = client.list_instances().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Network(_)));
}

#[tokio::test]
async fn test_rejected_token_logs_out_once() {
    let (url, recorder) = spawn_backend().await;
    let session = logged_in("tok-expired");
    let mut status = session.subscribe();
    let client = ApiClient::new(url, Arc::clone(&session));

    let (a, b) = tokio::join!(client.current_user(), client.current_user());
    assert!(a.unwrap_err().is_auth());
    assert!(b.unwrap_err().is_auth());

    assert!(!session.is_authenticated());
    assert!(status.has_changed().unwrap());
    assert_eq!(*status.borrow_and_update(), AuthStatus::LoggedOut { forced: true });

    // Later requests go out anonymously and do not re-trigger the logout.
    assert!(client.current_user().await.unwrap_err().is_auth());
    assert!(!status.has_changed().unwrap());
    assert_eq!(recorder.requests().last().unwrap().1, None);
}

#[tokio::test]
async fn test_login_returns_credentials() {
    let (url, recorder) = spawn_backend().await;
    let client = ApiClient::new(url, Arc::new(AuthSession::in_memory()));

    let creds = client.login("dev@example.com", "secret1").await.unwrap();
    assert_eq!(creds.token, "tok-fresh");
    assert_eq!(creds.user.username, "dev");
    assert_eq!(
        recorder.requests()[0].2,
        json!({ "email": "dev@example.com", "password": "secret1" })
    );

    let err = client.login("dev@example.com", "nope").await.unwrap_err();
    assert_eq!(err.localized(), "メールアドレスまたはパスワードが正しくありません");
}

#[tokio::test]
async fn test_current_user_unwraps_envelope() {
    let (url, _) = spawn_backend().await;
    let client = ApiClient::new(url, logged_in("tok-good"));

    let user = client.current_user().await.unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.created_at.as_deref(), Some("2025-01-01T00:00:00Z"));
}
