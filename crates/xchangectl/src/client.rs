//! HTTP client for the xchanged daemon.
//!
//! Communicates with xchanged via its local HTTP API.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xchange_core::posting::SkillForm;
use xchange_core::tagging::TagOutcome;
use xchange_core::{ConfirmOutcome, ExchangeSession, Query, SkillListing, SortMode, UserSummary};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running at {addr}\n  → start with: xchanged\n  → or set XCHANGED_ADDR if using a different address")]
    ConnectionFailed { addr: String },

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("unauthorized: check XCHANGED_TOKEN env var or --token flag")]
    Unauthorized,

    #[error(
        "daemon not ready after {timeout_ms}ms at {addr}\n  → ensure xchanged is running\n  → check XCHANGED_TOKEN if auth is enabled"
    )]
    DaemonNotReady { addr: String, timeout_ms: u64 },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            let addr = e
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            ClientError::ConnectionFailed { addr }
        } else {
            ClientError::HttpError {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

/// Request payload for POST /skills.
#[derive(Debug, Serialize)]
pub struct PostSkillRequest<'a> {
    pub form: &'a SkillForm,
    pub owner: &'a UserSummary,
}

/// Response from POST /skills.
#[derive(Debug, Deserialize)]
pub struct PostSkillResponse {
    pub listing: SkillListing,
    pub tags: Vec<String>,
    pub tagging: TagOutcome,
}

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    listings: Vec<SkillListing>,
}

#[derive(Debug, Deserialize)]
struct CategoriesResponse {
    categories: Vec<String>,
}

/// The caller's relation to a session.
#[derive(Debug, Deserialize)]
pub struct ViewerState {
    pub account: String,
    pub participant: bool,
    pub confirmed: bool,
}

/// Response from GET /sessions/{id}.
#[derive(Debug, Deserialize)]
pub struct SessionView {
    pub session: ExchangeSession,
    pub progress: u8,
    pub complete: bool,
    #[serde(default)]
    pub viewer: Option<ViewerState>,
}

/// Response from POST /sessions/{id}/complete.
#[derive(Debug, Deserialize)]
pub struct ConfirmResponse {
    pub outcome: ConfirmOutcome,
    #[serde(flatten)]
    pub view: SessionView,
}

/// Error response from API.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Default total timeout for the daemon readiness probe.
const DEFAULT_READY_TIMEOUT_MS: u64 = 5000;

/// Initial backoff delay for the readiness probe.
const INITIAL_BACKOFF_MS: u64 = 200;

/// HTTP client for xchanged.
#[derive(Debug)]
pub struct Client {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            http: reqwest::Client::new(),
        }
    }

    /// Returns the daemon address (for error messages).
    pub fn addr(&self) -> &str {
        &self.base_url
    }

    /// Probe /health. Err if the connection failed.
    pub async fn check_health(&self) -> Result<bool, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        Ok(response.status().is_success())
    }

    /// Wait for the daemon to become ready with exponential backoff.
    pub async fn wait_for_ready(&self) -> Result<(), ClientError> {
        self.wait_for_ready_with_timeout(DEFAULT_READY_TIMEOUT_MS)
            .await
    }

    /// Wait for the daemon to become ready with a custom timeout.
    pub async fn wait_for_ready_with_timeout(&self, timeout_ms: u64) -> Result<(), ClientError> {
        let start = std::time::Instant::now();
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match self.check_health().await {
                Ok(true) => return Ok(()),
                Ok(false) | Err(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    if elapsed >= timeout_ms {
                        return Err(ClientError::DaemonNotReady {
                            addr: self.base_url.clone(),
                            timeout_ms,
                        });
                    }

                    eprintln!(
                        "waiting for daemon at {} (retrying in {}ms)",
                        self.base_url, backoff_ms
                    );

                    let remaining = timeout_ms.saturating_sub(elapsed);
                    let sleep_ms = backoff_ms.min(remaining);
                    tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;

                    backoff_ms = backoff_ms.saturating_mul(2);
                }
            }
        }
    }

    /// Build headers with optional auth token.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    /// Handle error response from API.
    async fn handle_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();

        if status == 401 {
            return ClientError::Unauthorized;
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| "unknown error".to_string());

        match status {
            403 => ClientError::Forbidden(message),
            404 => ClientError::NotFound(message),
            _ => ClientError::HttpError { status, message },
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Filtered, sorted listings. `sort: None` leaves ordering to the
    /// daemon's configured default; `query.sort_mode` is not sent.
    /// GET /skills?search=...&type=...&location=...&sort=...
    pub async fn explore(
        &self,
        query: &Query,
        sort: Option<SortMode>,
    ) -> Result<Vec<SkillListing>, ClientError> {
        let url = format!("{}/skills?{}", self.base_url, explore_params(query, sort));
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        let body: ExploreResponse = self.decode(response).await?;
        Ok(body.listings)
    }

    /// Post a new listing.
    /// POST /skills
    pub async fn post_skill(
        &self,
        form: &SkillForm,
        owner: &UserSummary,
    ) -> Result<PostSkillResponse, ClientError> {
        let url = format!("{}/skills", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .json(&PostSkillRequest { form, owner })
            .send()
            .await?;
        self.decode(response).await
    }

    /// Categories offered by the posting form.
    /// GET /categories
    pub async fn categories(&self) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/categories", self.base_url);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        let body: CategoriesResponse = self.decode(response).await?;
        Ok(body.categories)
    }

    /// A session with derived progress, from `account`'s point of view if given.
    /// GET /sessions/{id}
    pub async fn get_session(
        &self,
        session_id: &str,
        account: Option<&str>,
    ) -> Result<SessionView, ClientError> {
        let mut url = format!(
            "{}/sessions/{}",
            self.base_url,
            urlencoding::encode(session_id)
        );
        if let Some(account) = account {
            url = format!("{}?account={}", url, urlencoding::encode(account));
        }
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        self.decode(response).await
    }

    /// Attest completion of a session as `account`.
    /// POST /sessions/{id}/complete
    pub async fn confirm(
        &self,
        session_id: &str,
        account: &str,
    ) -> Result<ConfirmResponse, ClientError> {
        let url = format!(
            "{}/sessions/{}/complete",
            self.base_url,
            urlencoding::encode(session_id)
        );
        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .json(&serde_json::json!({ "account": account }))
            .send()
            .await?;
        self.decode(response).await
    }

    /// Follow a session's event stream (SSE), calling `on_event` per event.
    /// Returns when the daemon closes the stream.
    pub async fn watch_session<F>(
        &self,
        session_id: &str,
        mut on_event: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&StreamedEvent),
    {
        use futures::StreamExt;

        let url = format!(
            "{}/sessions/{}/events",
            self.base_url,
            urlencoding::encode(session_id)
        );
        let response = self.http.get(&url).headers(self.headers()).send().await?;

        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::IoError(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE events are separated by a blank line.
            while let Some(end) = buffer.find("\n\n") {
                let event_str = buffer[..end].to_string();
                buffer = buffer[end + 2..].to_string();

                if let Some(event) = parse_sse_event(&event_str) {
                    on_event(&event);
                }
            }
        }

        if let Some(event) = parse_sse_event(&buffer) {
            on_event(&event);
        }

        Ok(())
    }
}

/// Query string for GET /skills. Inactive filters are omitted.
fn explore_params(query: &Query, sort: Option<SortMode>) -> String {
    let mut params = Vec::new();
    if let Some(sort) = sort {
        params.push(format!("sort={}", sort.as_str()));
    }
    if !query.search_term.is_empty() {
        params.push(format!("search={}", urlencoding::encode(&query.search_term)));
    }
    if query.type_filter.selected().is_some() {
        params.push(format!("type={}", query.type_filter.as_str()));
    }
    if query.location_filter.selected().is_some() {
        params.push(format!("location={}", query.location_filter.as_str()));
    }
    params.join("&")
}

/// One structured event from a session stream.
#[derive(Debug, Deserialize)]
pub struct StreamedEvent {
    pub event_type: String,
    pub timestamp: i64,
    pub payload: serde_json::Value,
}

/// Parse an SSE event block. Comments and keep-alives yield `None`.
fn parse_sse_event(event_str: &str) -> Option<StreamedEvent> {
    let data = event_str
        .lines()
        .find_map(|line| line.strip_prefix("data:"))?
        .trim();
    serde_json::from_str(data).ok()
}
