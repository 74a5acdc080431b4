use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use poker_clock_back::{
    auth::{JwtVerifier, Role},
    config::AppConfig,
    dao::tournament_store::memory::MemoryTournamentStore,
    routes,
    services::tournament_service,
    state::{AppState, SharedState},
};

const SECRET: &str = "integration-secret";

struct TestApp {
    state: SharedState,
    router: Router,
    tokens: JwtVerifier,
}

impl TestApp {
    async fn new() -> Self {
        let config = AppConfig::default().with_jwt_secret(SECRET);
        let state = AppState::new(config, Arc::new(JwtVerifier::new(SECRET)));
        state
            .install_store(Arc::new(MemoryTournamentStore::new()))
            .await;
        tournament_service::restore_active(&state).await.unwrap();
        Self {
            router: routes::router(state.clone()),
            state,
            tokens: JwtVerifier::new(SECRET),
        }
    }

    fn token(&self, username: &str, role: Role) -> String {
        self.tokens
            .issue(username, role, Duration::from_secs(600))
            .unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // Extractor rejections answer with plain text.
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }
}

#[tokio::test]
async fn healthcheck_reports_loaded_clocks() {
    let app = TestApp::new().await;
    let (status, body) = app.call("GET", "/healthcheck", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["loadedTournaments"], 1);
}

#[tokio::test]
async fn admin_routes_require_an_admin_token() {
    let app = TestApp::new().await;
    let create = json!({"name": "Fredag"});

    let (status, _) = app
        .call("POST", "/api/admin/tournaments", None, Some(create.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call("POST", "/api/admin/tournaments", Some("garbage"), Some(create.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let viewer = app.token("kari", Role::Viewer);
    let (status, body) = app
        .call("POST", "/api/admin/tournaments", Some(&viewer), Some(create))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("admin"));
}

#[tokio::test]
async fn created_tournament_is_listed_with_a_live_clock() {
    let app = TestApp::new().await;
    let admin = app.token("director", Role::Admin);

    let (status, created) = app
        .call(
            "POST",
            "/api/admin/tournaments",
            Some(&admin),
            Some(json!({"name": "Fredag"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Fredag");
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_u64().unwrap();
    assert_eq!(id, 2);

    let (status, list) = app.call("GET", "/api/tournaments", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, details) = app
        .call("GET", &format!("/api/tournaments/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["snapshot"]["tournament"]["name"], "Fredag");
    assert_eq!(details["snapshot"]["timing"]["total"], 900.0);
    assert_eq!(details["players"], json!([]));

    let (status, _) = app.call("GET", "/api/tournaments/99", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let app = TestApp::new().await;
    let admin = app.token("director", Role::Admin);
    let (status, _) = app
        .call(
            "PATCH",
            "/api/admin/tournaments/1",
            Some(&admin),
            Some(json!({"name": "   "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, renamed) = app
        .call(
            "PATCH",
            "/api/admin/tournaments/1",
            Some(&admin),
            Some(json!({"name": "Lørdag"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Lørdag");
}

#[tokio::test]
async fn finishing_unloads_the_clock_and_cannot_repeat() {
    let app = TestApp::new().await;
    let admin = app.token("director", Role::Admin);

    let (status, finished) = app
        .call("POST", "/api/admin/tournaments/1/finish", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(finished["status"], "finished");
    assert!(!app.state.clocks().contains(1));

    let (status, details) = app.call("GET", "/api/tournaments/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["snapshot"], Value::Null);

    let (status, _) = app
        .call("POST", "/api/admin/tournaments/1/finish", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call("GET", "/api/tournaments?status=finished", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn registration_is_limited_to_one_open_tournament() {
    let app = TestApp::new().await;
    let admin = app.token("director", Role::Admin);
    let player = app.token("kari", Role::Viewer);
    app.call(
        "POST",
        "/api/admin/tournaments",
        Some(&admin),
        Some(json!({"name": "Second"})),
    )
    .await;

    let (status, entry) = app
        .call("POST", "/api/me/register", Some(&player), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["tournamentId"], 1);
    assert_eq!(entry["nickname"], "kari");

    let (status, _) = app
        .call("POST", "/api/me/register", Some(&player), Some(json!({"tournamentId": 1})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call("POST", "/api/me/register", Some(&player), Some(json!({"tournament_id": 2})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflictTournamentId"], 1);

    let (status, players) = app
        .call("GET", "/api/players?tournament_id=1", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(players.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn profile_routes_need_a_token_and_validate_nicknames() {
    let app = TestApp::new().await;
    let (status, _) = app.call("GET", "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let player = app.token("kari", Role::Viewer);
    let (status, profile) = app.call("GET", "/api/me", Some(&player), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "kari");
    assert_eq!(profile["activeTournamentId"], Value::Null);

    let long = "x".repeat(65);
    let (status, _) = app
        .call("PATCH", "/api/me", Some(&player), Some(json!({"nickname": long})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, profile) = app
        .call("PATCH", "/api/me", Some(&player), Some(json!({"nickname": " Kari "})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["nickname"], "Kari");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, doc) = app.call("GET", "/api-doc/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/ws/clock/{tournament_id}"].is_object());
}
