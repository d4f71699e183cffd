//! HTTP control plane for xchanged.
//!
//! Local-only REST API used by the UI: discovery, posting, and session
//! completion. Bound to 127.0.0.1; optional bearer-token auth.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{
    stream::{self, Stream},
    StreamExt,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use xchange_core::events::Event;
use xchange_core::posting::{SkillForm, CATEGORIES};
use xchange_core::session::{Outline, SessionParams, Side};
use xchange_core::{
    ConfirmOutcome, ExchangeSession, Id, Identity, LocationFilter, SessionError, SessionStatus,
    SkillListing, SortMode, TypeFilter, UserSummary,
};

use crate::exchange::{ExchangeError, ExchangeService, PostOutcome};
use crate::store::StoreError;

/// Interval between event-log polls on an open session stream.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shared state for HTTP handlers.
pub struct AppState {
    pub service: Arc<ExchangeService>,
    pub auth_token: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Create the HTTP router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/skills", get(explore_skills).post(post_skill))
        .route("/skills/{id}", get(get_skill))
        .route("/categories", get(list_categories))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/complete", post(confirm_completion))
        .route("/sessions/{id}/events", get(stream_events))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Validate auth token if configured.
fn check_auth(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(expected) = &state.auth_token {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.strip_prefix("Bearer ").unwrap_or(s));

        match provided {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(api_error(StatusCode::UNAUTHORIZED, "invalid auth token")),
            None => Err(api_error(StatusCode::UNAUTHORIZED, "missing auth token")),
        }
    } else {
        Ok(())
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a service failure onto a status code.
fn exchange_error(e: &ExchangeError) -> ApiError {
    let status = match e {
        ExchangeError::Validation(_) => StatusCode::BAD_REQUEST,
        ExchangeError::Session(SessionError::NotAParticipant { .. }) => StatusCode::FORBIDDEN,
        ExchangeError::Session(_) => StatusCode::BAD_REQUEST,
        ExchangeError::Store(StoreError::SessionNotFound(_) | StoreError::ListingNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        ExchangeError::Store(StoreError::DuplicateListing(_) | StoreError::DuplicateSession(_)) => {
            StatusCode::CONFLICT
        }
        ExchangeError::Store(StoreError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("request failed: {}", e);
    }
    api_error(status, e.to_string())
}

// --- Request/Response types ---

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query params for GET /skills. Absent params fall back to defaults.
#[derive(Debug, Deserialize, Default)]
pub struct ExploreQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, rename = "type")]
    pub skill_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

impl ExploreQuery {
    fn into_query(self, default_sort: SortMode) -> Result<xchange_core::Query, ApiError> {
        fn parse<T>(value: Option<String>, default: T) -> Result<T, ApiError>
        where
            T: std::str::FromStr<Err = xchange_core::ParseEnumError>,
        {
            match value {
                Some(v) if !v.trim().is_empty() => v
                    .parse()
                    .map_err(|e: xchange_core::ParseEnumError| {
                        api_error(StatusCode::BAD_REQUEST, e.to_string())
                    }),
                _ => Ok(default),
            }
        }

        Ok(xchange_core::Query {
            search_term: self.search.unwrap_or_default(),
            type_filter: parse(self.skill_type, TypeFilter::All)?,
            location_filter: parse(self.location, LocationFilter::All)?,
            sort_mode: parse(self.sort, default_sort)?,
        })
    }
}

/// Response for GET /skills.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExploreResponse {
    pub listings: Vec<SkillListing>,
}

/// Request payload for POST /skills.
#[derive(Debug, Deserialize)]
pub struct PostSkillRequest {
    pub form: SkillForm,
    pub owner: UserSummary,
}

/// Response for GET /categories.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

/// One side of a session as supplied by the matching process.
#[derive(Debug, Deserialize)]
pub struct SideRequest {
    pub skill_title: String,
    pub owner_name: String,
    pub owner: String,
}

impl SideRequest {
    fn into_side(self) -> Side {
        Side::new(self.skill_title, self.owner_name, Identity::new(self.owner))
    }
}

/// Request payload for POST /sessions.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub side_a: SideRequest,
    pub side_b: SideRequest,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub outline: Outline,
    #[serde(default)]
    pub contract_address: String,
}

/// Query params for GET /sessions/{id}.
#[derive(Debug, Deserialize, Default)]
pub struct SessionQuery {
    /// Connected account; adds the caller's own confirmation state.
    #[serde(default)]
    pub account: Option<String>,
}

/// The caller's relation to a session.
#[derive(Debug, Serialize, Deserialize)]
pub struct ViewerState {
    pub account: String,
    pub participant: bool,
    pub confirmed: bool,
}

/// A session plus its derived completion fields.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session: ExchangeSession,
    pub progress: u8,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerState>,
}

impl SessionView {
    fn new(session: ExchangeSession, account: Option<&Identity>) -> Self {
        let viewer = account.map(|identity| ViewerState {
            account: identity.to_string(),
            participant: session.is_participant(identity),
            confirmed: session.has_confirmed(identity),
        });
        Self {
            progress: session.progress_percentage(),
            complete: session.is_complete(),
            viewer,
            session,
        }
    }
}

/// Response for GET /sessions.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
}

/// Request payload for POST /sessions/{id}/complete.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub account: String,
}

/// Response for POST /sessions/{id}/complete.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub outcome: ConfirmOutcome,
    #[serde(flatten)]
    pub view: SessionView,
}

// --- Handlers ---

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /skills - Filtered, sorted listings.
async fn explore_skills(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ExploreQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    let query = query.into_query(state.service.default_sort())?;
    let listings = state.service.explore(&query).await;
    Ok(Json(ExploreResponse { listings }))
}

/// POST /skills - Post a new listing.
async fn post_skill(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PostSkillRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    let outcome: PostOutcome = state
        .service
        .post_skill(&req.form, req.owner)
        .await
        .map_err(|e| {
            warn!("failed to post skill: {}", e);
            exchange_error(&e)
        })?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /skills/{id} - A single listing.
async fn get_skill(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    let listing = state
        .service
        .listing(&Id::from_string(&id))
        .await
        .map_err(|e| exchange_error(&e))?;
    Ok(Json(listing))
}

/// GET /categories - Categories offered by the posting form.
async fn list_categories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    Ok(Json(CategoriesResponse {
        categories: CATEGORIES.iter().map(|c| (*c).to_string()).collect(),
    }))
}

/// POST /sessions - Register a session produced by matching.
async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    let params = SessionParams {
        id: req.id.map_or_else(Id::new, Id::from_string),
        side_a: req.side_a.into_side(),
        side_b: req.side_b.into_side(),
        status: req.status,
        outline: req.outline,
        contract_address: req.contract_address,
        created_at: Utc::now(),
    };

    let session = state.service.open_session(params).await.map_err(|e| {
        warn!("failed to open session: {}", e);
        exchange_error(&e)
    })?;

    Ok((StatusCode::CREATED, Json(SessionView::new(session, None))))
}

/// GET /sessions - All sessions, oldest first.
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    let account = query.account.map(Identity::new);
    let sessions = state
        .service
        .sessions()
        .await
        .into_iter()
        .map(|session| SessionView::new(session, account.as_ref()))
        .collect();
    Ok(Json(SessionsResponse { sessions }))
}

/// GET /sessions/{id} - Session with derived progress.
async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    let session = state
        .service
        .session(&Id::from_string(&id))
        .await
        .map_err(|e| exchange_error(&e))?;

    let account = query.account.map(Identity::new);
    Ok(Json(SessionView::new(session, account.as_ref())))
}

/// POST /sessions/{id}/complete - Record the caller's completion attestation.
async fn confirm_completion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, &headers)?;

    let actor = Identity::new(req.account);
    let confirmation = state
        .service
        .confirm(&Id::from_string(&id), &actor)
        .await
        .map_err(|e| exchange_error(&e))?;

    info!(
        "completion attestation on {}: {}",
        id,
        confirmation.outcome.as_str()
    );
    Ok(Json(ConfirmResponse {
        outcome: confirmation.outcome,
        view: SessionView::new(confirmation.session, Some(&actor)),
    }))
}

// --- SSE Streaming ---

/// SSE event data wrapper for structured events.
#[derive(Debug, Serialize)]
struct SseEventData {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    event_type: &'static str,
    timestamp: i64,
    payload: serde_json::Value,
}

impl From<&Event> for SseEventData {
    fn from(event: &Event) -> Self {
        let payload: serde_json::Value =
            serde_json::from_str(&event.payload_json).unwrap_or(serde_json::Value::Null);
        SseEventData {
            id: event.id.to_string(),
            session_id: event.session_id.as_ref().map(ToString::to_string),
            event_type: event.event_type.as_str(),
            timestamp: event.timestamp.timestamp_millis(),
            payload,
        }
    }
}

fn to_sse(event: &Event) -> Result<SseEvent, Infallible> {
    let data = SseEventData::from(event);
    let json = serde_json::to_string(&data).unwrap_or_default();
    Ok(SseEvent::default()
        .event(data.event_type)
        .data(json)
        .id(data.id))
}

/// GET /sessions/{id}/events - Stream a session's events (SSE).
///
/// Replays the log, then polls until the session completes.
async fn stream_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    check_auth(&state, &headers)?;

    let session_id = Id::from_string(&id);
    state
        .service
        .session(&session_id)
        .await
        .map_err(|e| exchange_error(&e))?;

    let service = Arc::clone(&state.service);

    // Stream state: (service, session_id, events_sent, polled, finished)
    let stream = stream::unfold(
        (service, session_id, 0usize, false, false),
        move |(service, session_id, sent, polled, finished)| async move {
            if finished {
                return None;
            }
            if polled {
                tokio::time::sleep(EVENT_POLL_INTERVAL).await;
            }

            // Completion is read before the log so the final events are
            // never skipped.
            let complete = match service.session(&session_id).await {
                Ok(session) => session.is_complete(),
                Err(_) => return None,
            };
            let events = service.session_events(&session_id).await;
            let batch: Vec<_> = events.iter().skip(sent).map(to_sse).collect();

            Some((
                stream::iter(batch),
                (service, session_id, events.len(), true, complete),
            ))
        },
    )
    .flatten();

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{KeywordTagger, LogCredentialIssuer};
    use crate::exchange::ServiceConfig;
    use crate::seed;
    use crate::store::Store;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn create_test_app(auth_token: Option<&str>) -> Router {
        let store = Arc::new(Store::new());
        seed::load(&store).await.unwrap();
        let service = ExchangeService::new(
            store,
            Arc::new(KeywordTagger),
            Arc::new(LogCredentialIssuer),
            ServiceConfig::default(),
        );
        create_router(Arc::new(AppState {
            service: Arc::new(service),
            auth_token: auth_token.map(ToString::to_string),
        }))
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let app = create_test_app(Some("secret")).await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn auth_token_is_enforced() {
        let app = create_test_app(Some("secret")).await;

        let missing = app
            .clone()
            .oneshot(Request::get("/skills").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(
                Request::get("/skills")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let ok = app
            .oneshot(
                Request::get("/skills")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_sort_is_bad_request() {
        let app = create_test_app(None).await;
        let response = app
            .oneshot(Request::get("/skills?sort=popular").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("popular"));
    }

    #[test]
    fn explore_query_defaults_to_configured_sort() {
        let query = ExploreQuery::default()
            .into_query(SortMode::Verified)
            .unwrap();
        assert_eq!(query.sort_mode, SortMode::Verified);
        assert_eq!(query.type_filter, TypeFilter::All);
        assert_eq!(query.location_filter, LocationFilter::All);

        let query = ExploreQuery {
            search: Some("react".to_string()),
            skill_type: Some("Teach".to_string()),
            location: Some("in-person".to_string()),
            sort: Some(String::new()),
        }
        .into_query(SortMode::Recent)
        .unwrap();
        assert_eq!(query.search_term, "react");
        assert_eq!(query.type_filter, TypeFilter::Teach);
        assert_eq!(query.location_filter, LocationFilter::InPerson);
        assert_eq!(query.sort_mode, SortMode::Recent);
    }

    #[test]
    fn exchange_errors_map_to_status_codes() {
        let cases = [
            (
                ExchangeError::Session(SessionError::NotAParticipant {
                    identity: Identity::from("0xC"),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                ExchangeError::Store(StoreError::SessionNotFound("9".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                ExchangeError::Store(StoreError::DuplicateSession("1".to_string())),
                StatusCode::CONFLICT,
            ),
            (
                ExchangeError::Session(SessionError::DuplicateParticipant {
                    identity: Identity::from("0xA"),
                }),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(exchange_error(&err).0, expected);
        }
    }
}
