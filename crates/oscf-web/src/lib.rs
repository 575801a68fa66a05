//! Axum JSON API over the profile store, issue catalog and match engine.

use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use oscf_catalog::IssueCatalog;
use oscf_core::DeveloperProfile;
use oscf_digest::{LogNotifier, MatchNotifier};
use oscf_matcher::MatchEngine;
use oscf_store::{JsonProfileStore, StoreError};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::error;

pub const CRATE_NAME: &str = "oscf-web";

/// Shared application state. Collaborators are passed in explicitly so tests
/// can wire a fixture catalog and a recording notifier.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<JsonProfileStore>>,
    catalog: Arc<IssueCatalog>,
    notifier: Arc<dyn MatchNotifier>,
    engine: MatchEngine,
}

impl AppState {
    pub fn new(
        store: JsonProfileStore,
        catalog: IssueCatalog,
        notifier: Arc<dyn MatchNotifier>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            catalog: Arc::new(catalog),
            notifier,
            engine: MatchEngine::default(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/profiles",
            get(list_profiles_handler).post(create_profile_handler),
        )
        .route(
            "/profiles/{email}",
            get(get_profile_handler).delete(delete_profile_handler),
        )
        .route("/profiles/{email}/matches", get(matches_handler))
        .route("/profiles/{email}/notify", post(notify_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("OSCF_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let store_path = std::env::var("OSCF_STORE_PATH").unwrap_or_else(|_| "./profiles.json".into());

    let store = JsonProfileStore::open(store_path).await;
    let catalog = IssueCatalog::from_env()?;
    let state = AppState::new(store, catalog, Arc::new(LogNotifier));

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize, Default)]
struct MatchQuery {
    limit: Option<usize>,
}

async fn healthz_handler() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

async fn list_profiles_handler(State(state): State<Arc<AppState>>) -> Response {
    let store = state.store.lock().await;
    Json(store.all()).into_response()
}

async fn create_profile_handler(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<DeveloperProfile>,
) -> Response {
    let mut store = state.store.lock().await;
    match store.upsert(profile.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(StoreError::Invalid(err)) => {
            error_body(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
        }
        Err(StoreError::Io(err)) => server_error(err),
    }
}

async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    let store = state.store.lock().await;
    match store.get(&email) {
        Some(profile) => Json(profile.clone()).into_response(),
        None => error_body(StatusCode::NOT_FOUND, "profile not found"),
    }
}

async fn delete_profile_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    let mut store = state.store.lock().await;
    match store.delete(&email).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_body(StatusCode::NOT_FOUND, "profile not found"),
        Err(StoreError::Io(err)) => server_error(err),
        Err(StoreError::Invalid(err)) => server_error(anyhow::anyhow!(err)),
    }
}

async fn matches_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(email): AxumPath<String>,
    Query(query): Query<MatchQuery>,
) -> Response {
    let Some(profile) = lookup_profile(&state, &email).await else {
        return error_body(StatusCode::NOT_FOUND, "profile not found");
    };

    let candidate_set = match state.catalog.candidate_issues().await {
        Ok(set) => set,
        Err(err) => return error_body(StatusCode::BAD_GATEWAY, &err.to_string()),
    };

    let limit = query.limit.unwrap_or(MatchEngine::DEFAULT_LIMIT);
    let matches = state.engine.rank(&candidate_set.issues, &profile, limit);
    Json(json!({
        "source_id": candidate_set.source_id,
        "matches": matches,
    }))
    .into_response()
}

async fn notify_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    let Some(profile) = lookup_profile(&state, &email).await else {
        return error_body(StatusCode::NOT_FOUND, "profile not found");
    };

    let candidate_set = match state.catalog.candidate_issues().await {
        Ok(set) => set,
        Err(err) => return error_body(StatusCode::BAD_GATEWAY, &err.to_string()),
    };

    let matches = state
        .engine
        .rank(&candidate_set.issues, &profile, MatchEngine::DEFAULT_LIMIT);
    if !matches.is_empty() {
        if let Err(err) = state.notifier.notify(&profile, &matches).await {
            return server_error(anyhow::anyhow!(err));
        }
    }
    Json(json!({
        "notified": !matches.is_empty(),
        "matches": matches.len(),
    }))
    .into_response()
}

async fn lookup_profile(state: &AppState, email: &str) -> Option<DeveloperProfile> {
    let store = state.store.lock().await;
    store.get(email).cloned()
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn server_error(err: anyhow::Error) -> Response {
    error!(%err, "request failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use oscf_core::ExperienceLevel;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn test_app(dir: &tempfile::TempDir) -> Router {
        let store = JsonProfileStore::open(dir.path().join("profiles.json")).await;
        let state = AppState::new(store, IssueCatalog::fixture_only(), Arc::new(LogNotifier));
        app(state)
    }

    fn profile_json() -> serde_json::Value {
        json!({
            "email": "dev1@example.com",
            "skills": ["JavaScript"],
            "interests": ["documentation"],
            "experienceLevel": "intermediate"
        })
    }

    fn post_profile(body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/profiles")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let dir = tempdir().expect("tempdir");
        let app = test_app(&dir).await;
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn profile_crud_round_trip() {
        let dir = tempdir().expect("tempdir");
        let app = test_app(&dir).await;

        let created = app
            .clone()
            .oneshot(post_profile(&profile_json()))
            .await
            .expect("response");
        assert_eq!(created.status(), StatusCode::CREATED);

        let fetched = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/profiles/dev1@example.com")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(fetched.status(), StatusCode::OK);
        let profile: DeveloperProfile =
            serde_json::from_value(body_json(fetched).await).expect("profile");
        assert_eq!(profile.experience_level, ExperienceLevel::Intermediate);

        let listed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/profiles")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let list = body_json(listed).await;
        assert_eq!(list.as_array().map(Vec::len), Some(1));

        let deleted = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/profiles/dev1@example.com")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let gone = app
            .oneshot(
                Request::builder()
                    .uri("/profiles/dev1@example.com")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected_with_422() {
        let dir = tempdir().expect("tempdir");
        let app = test_app(&dir).await;

        let mut body = profile_json();
        body["email"] = json!("not-an-email");
        let resp = app.oneshot(post_profile(&body)).await.expect("response");
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err = body_json(resp).await;
        assert!(err["error"].as_str().expect("message").contains("email"));
    }

    #[tokio::test]
    async fn matches_endpoint_ranks_fixture_issues() {
        let dir = tempdir().expect("tempdir");
        let app = test_app(&dir).await;
        app.clone()
            .oneshot(post_profile(&profile_json()))
            .await
            .expect("create");

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/profiles/dev1@example.com/matches")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["source_id"], "fixture");

        let matches = body["matches"].as_array().expect("matches array");
        assert!(!matches.is_empty());
        let scores: Vec<u64> = matches
            .iter()
            .map(|m| m["score"].as_u64().expect("score"))
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        for entry in matches {
            assert!(!entry["reasons"].as_array().expect("reasons").is_empty());
        }

        let limited = app
            .oneshot(
                Request::builder()
                    .uri("/profiles/dev1@example.com/matches?limit=1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let limited_body = body_json(limited).await;
        assert_eq!(
            limited_body["matches"].as_array().map(Vec::len),
            Some(1)
        );
    }

    #[tokio::test]
    async fn matches_for_unknown_profile_is_404() {
        let dir = tempdir().expect("tempdir");
        let app = test_app(&dir).await;
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/profiles/ghost@example.com/matches")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn notify_endpoint_reports_match_count() {
        let dir = tempdir().expect("tempdir");
        let app = test_app(&dir).await;
        app.clone()
            .oneshot(post_profile(&profile_json()))
            .await
            .expect("create");

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/profiles/dev1@example.com/notify")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["notified"], true);
        assert!(body["matches"].as_u64().expect("count") >= 1);
    }
}
