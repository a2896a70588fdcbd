// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use netatmo_dashboard::config::Config;
use netatmo_dashboard::db::FirestoreDb;
use netatmo_dashboard::middleware::auth::create_jwt;
use netatmo_dashboard::models::CredentialRecord;
use netatmo_dashboard::routes::create_router;
use netatmo_dashboard::AppState;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Unique uid for test isolation.
#[allow(dead_code)]
pub fn unique_uid(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

/// Current time in epoch milliseconds.
#[allow(dead_code)]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A credential record expiring `expires_in_ms` from now.
#[allow(dead_code)]
pub fn credentials(uid: &str, expires_in_ms: i64, refresh: Option<&str>) -> CredentialRecord {
    CredentialRecord {
        uid: uid.to_string(),
        access_token: Some("stored-access".to_string()),
        refresh_token: refresh.map(str::to_string),
        expires_at: Some(now_ms() + expires_in_ms),
        enabled: true,
    }
}

// ─── Fake Netatmo API ────────────────────────────────────────

/// Behaviour and counters shared with the fake server.
#[derive(Default)]
pub struct FakeNetatmoState {
    pub token_calls: AtomicUsize,
    pub measure_calls: AtomicUsize,
    /// Token endpoint answers 400 `invalid_grant` when set
    pub reject_tokens: AtomicBool,
    /// Token endpoint answers 503 when set
    pub token_outage: AtomicBool,
    /// Forms posted to the token endpoint, in order
    pub token_forms: Mutex<Vec<HashMap<String, String>>>,
    /// Query strings received by `getmeasure`, in order
    pub measure_queries: Mutex<Vec<HashMap<String, String>>>,
    /// `type` parameter → response `body`
    pub measure_bodies: Mutex<HashMap<String, Value>>,
    /// `type` parameters that answer 500
    pub failing_types: Mutex<HashSet<String>>,
    /// `type` parameters that sleep longer than any client timeout
    pub slow_types: Mutex<HashSet<String>>,
}

/// Local stand-in for the Netatmo API on an ephemeral port.
pub struct FakeNetatmo {
    pub base_url: String,
    pub state: Arc<FakeNetatmoState>,
}

#[allow(dead_code)]
impl FakeNetatmo {
    pub async fn start() -> Self {
        let state = Arc::new(FakeNetatmoState::default());
        let app = Router::new()
            .route("/oauth2/token", post(fake_token))
            .route("/api/getmeasure", get(fake_getmeasure))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn measure_calls(&self) -> usize {
        self.state.measure_calls.load(Ordering::SeqCst)
    }

    pub fn reject_tokens(&self) {
        self.state.reject_tokens.store(true, Ordering::SeqCst);
    }

    pub fn token_outage(&self) {
        self.state.token_outage.store(true, Ordering::SeqCst);
    }

    pub fn last_token_form(&self) -> Option<HashMap<String, String>> {
        self.state.token_forms.lock().unwrap().last().cloned()
    }

    pub fn measure_queries(&self) -> Vec<HashMap<String, String>> {
        self.state.measure_queries.lock().unwrap().clone()
    }

    pub fn set_measure_body(&self, measure_type: &str, body: Value) {
        self.state
            .measure_bodies
            .lock()
            .unwrap()
            .insert(measure_type.to_string(), body);
    }

    pub fn fail_measure(&self, measure_type: &str) {
        self.state
            .failing_types
            .lock()
            .unwrap()
            .insert(measure_type.to_string());
    }

    pub fn slow_measure(&self, measure_type: &str) {
        self.state
            .slow_types
            .lock()
            .unwrap()
            .insert(measure_type.to_string());
    }
}

async fn fake_token(
    State(state): State<Arc<FakeNetatmoState>>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let n = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    state.token_forms.lock().unwrap().push(form);

    if state.token_outage.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "temporarily_unavailable" })),
        );
    }

    if state.reject_tokens.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": format!("access-{}", n),
            "refresh_token": format!("refresh-{}", n),
            "expires_in": 10800,
            "expire_in": 10800,
            "scope": ["read_station", "read_thermostat"]
        })),
    )
}

async fn fake_getmeasure(
    State(state): State<Arc<FakeNetatmoState>>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.measure_calls.fetch_add(1, Ordering::SeqCst);
    let measure_type = query.get("type").cloned().unwrap_or_default();
    state.measure_queries.lock().unwrap().push(query);

    let slow = state.slow_types.lock().unwrap().contains(&measure_type);
    if slow {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    let failing = state.failing_types.lock().unwrap().contains(&measure_type);
    if failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "code": 500, "message": "Internal error" } })),
        );
    }

    let body = state
        .measure_bodies
        .lock()
        .unwrap()
        .get(&measure_type)
        .cloned()
        .unwrap_or_else(|| json!({}));

    (
        StatusCode::OK,
        Json(json!({ "body": body, "status": "ok", "time_exec": 0.01 })),
    )
}

// ─── App Construction ────────────────────────────────────────

/// Config pointing at `fake` with a short HTTP timeout.
#[allow(dead_code)]
pub fn test_config(fake: &FakeNetatmo) -> Config {
    let mut config = Config::test_default();
    config.netatmo_api_url = fake.base_url.clone();
    config.http_timeout = Duration::from_millis(500);
    config
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(config: Config) -> (axum::Router, Arc<AppState>) {
    let db = test_db_offline();
    let state = Arc::new(AppState::new(config, db).expect("Failed to build app state"));

    (create_router(state.clone()), state)
}

/// Session cookie header value for `uid`.
#[allow(dead_code)]
pub fn session_cookie(uid: &str, config: &Config) -> String {
    let jwt = create_jwt(uid, &config.jwt_signing_key).unwrap();
    format!("netatmo_session={}", jwt)
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
