//! Authenticated request gateway
//!
//! Every call to the task service goes through [`Gateway::request`]. The
//! gateway attaches the stored access token, and when the service answers
//! `401` it refreshes the token once (shared by every request that hit the
//! same expiry) and replays the original request a single time.

use crate::config::ClientConfig;
use crate::error::{ClientError, RefreshFailure};
use crate::session::Session;
use futures::FutureExt;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Path of the token refresh endpoint
pub const REFRESH_PATH: &str = "/api/token/refresh/";

const DEFAULT_USER_AGENT: &str = concat!("taskboard-client/", env!("CARGO_PKG_VERSION"));

/// Request body, replayable as-is on retry
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Vec<u8>),
    Text(String),
}

/// A request relative to the gateway's base URL
///
/// Kept as plain data rather than a `reqwest::RequestBuilder` so that the
/// identical request can be sent a second time after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header; a caller-supplied `Authorization` is replaced by the
    /// session credential when one is stored
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as the JSON request body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(RequestBody::Json(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Send `body` verbatim
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Decoded success body: JSON when it parses, raw text otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ResponseBody {
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            return Self::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }

    /// JSON value, `Null` for text or empty bodies
    pub fn into_json(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(_) | Self::Empty => Value::Null,
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: Option<String>,
}

struct GatewayInner {
    http: Client,
    base_url: String,
    session: Arc<Session>,
}

/// Authenticated gateway to the task service
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.inner.base_url)
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway with default settings and an in-memory session
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Create a gateway from loaded configuration
    pub fn from_config(config: &ClientConfig, session: Arc<Session>) -> Result<Self, ClientError> {
        let mut builder = Self::builder()
            .base_url(config.base_url.clone())
            .user_agent(config.user_agent.clone())
            .session(session);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// Send `request` with the session credential attached
    ///
    /// A `401` triggers one refresh and one replay; whatever the replay
    /// returns is handed back, even another `401`. Any other status is
    /// returned untouched. When the refresh fails the request is not
    /// replayed and the caller gets [`ClientError::SessionExpired`].
    pub async fn request(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let response = self.send(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            "Access token rejected, refreshing"
        );
        self.ensure_fresh_access_token()
            .await
            .map_err(ClientError::SessionExpired)?;

        self.send(request).await
    }

    async fn send(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let mut headers = request.headers.clone();
        if let Some(token) = self.inner.session.access_token()? {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::Storage("stored access token is not a valid header value".into())
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        match &request.body {
            Some(RequestBody::Json(bytes)) => {
                headers
                    .entry(header::CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
                builder = builder.body(bytes.clone());
            }
            Some(RequestBody::Text(text)) => builder = builder.body(text.clone()),
            None => {}
        }

        debug!(method = %request.method, path = %request.path, "Sending request");
        Ok(builder.headers(headers).send().await?)
    }

    /// Make sure the next request carries a usable access token
    ///
    /// Concurrent callers share one refresh call. Without a stored refresh
    /// token the session is terminated immediately and nothing is sent.
    pub async fn ensure_fresh_access_token(&self) -> Result<String, RefreshFailure> {
        let session = &self.inner.session;
        let refresh = match session.refresh_token() {
            Ok(Some(refresh)) => refresh,
            Ok(None) => {
                let failure = RefreshFailure::MissingRefreshToken;
                session.terminate(&failure);
                return Err(failure);
            }
            Err(e) => {
                warn!("Failed to read refresh token: {e}");
                let failure = RefreshFailure::MissingRefreshToken;
                session.terminate(&failure);
                return Err(failure);
            }
        };

        // The refresh future is parked in the session's own slot, so it holds
        // the session weakly
        let http = self.inner.http.clone();
        let url = self.url(REFRESH_PATH);
        let weak_session = Arc::downgrade(session);
        let handle = session.join_or_start_refresh(move || {
            async move {
                let outcome = call_refresh(&http, &url, &refresh).await;
                let Some(session) = weak_session.upgrade() else {
                    return Err(RefreshFailure::Transport(
                        "session closed during refresh".into(),
                    ));
                };
                session.clear_in_flight();

                match outcome {
                    Ok(access) => match session.accept_refreshed(&refresh, &access) {
                        Ok(true) => {
                            info!("Access token refreshed");
                            Ok(access)
                        }
                        Ok(false) => Err(RefreshFailure::MissingRefreshToken),
                        Err(e) => {
                            let failure = RefreshFailure::Storage(e.to_string());
                            session.terminate(&failure);
                            Err(failure)
                        }
                    },
                    Err(failure) => {
                        session.terminate(&failure);
                        Err(failure)
                    }
                }
            }
            .boxed()
        });

        handle.await
    }

    /// Send without credentials and without refresh handling
    pub(crate) async fn send_public(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.headers.clone());
        match &request.body {
            Some(RequestBody::Json(bytes)) => {
                builder = builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            Some(RequestBody::Text(text)) => builder = builder.body(text.clone()),
            None => {}
        }
        Ok(builder.send().await?)
    }

    /// Execute a request and decode the success body as JSON or text
    pub async fn execute_body(&self, request: &ApiRequest) -> Result<ResponseBody, ClientError> {
        let response = self.request(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            Ok(ResponseBody::from_text(text))
        } else {
            Err(ClientError::from_status(status, text))
        }
    }

    /// Execute a request and deserialize the success body
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ClientError> {
        let response = self.request(request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }
}

async fn call_refresh(http: &Client, url: &str, refresh: &str) -> Result<String, RefreshFailure> {
    let response = http
        .post(url)
        .json(&RefreshRequest { refresh })
        .send()
        .await
        .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefreshFailure::Rejected(status.as_u16()));
    }

    let body: RefreshResponse = response
        .json()
        .await
        .map_err(|_| RefreshFailure::MissingAccessToken)?;

    body.access
        .filter(|access| !access.is_empty())
        .ok_or(RefreshFailure::MissingAccessToken)
}

/// Builder for [`Gateway`]
#[derive(Default)]
pub struct GatewayBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    session: Option<Arc<Session>>,
}

impl GatewayBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use an existing session instead of a fresh in-memory one
    #[must_use]
    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<Gateway, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url}: {e}")))?;

        let mut client_builder = ClientBuilder::new()
            .user_agent(self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()));
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                http: client_builder.build()?,
                base_url,
                session: self
                    .session
                    .unwrap_or_else(|| Arc::new(Session::in_memory())),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = Gateway::builder().build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let gateway = Gateway::new("http://127.0.0.1:8000/").unwrap();
        assert_eq!(gateway.base_url(), "http://127.0.0.1:8000");
    }

    #[test]
    fn test_builder_rejects_invalid_url() {
        let result = Gateway::new("not a url");
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_response_body_from_text() {
        assert_eq!(ResponseBody::from_text(String::new()), ResponseBody::Empty);
        assert_eq!(
            ResponseBody::from_text(r#"{"msg":"ok"}"#.into()),
            ResponseBody::Json(serde_json::json!({"msg": "ok"}))
        );
        assert_eq!(
            ResponseBody::from_text("Deleted".into()),
            ResponseBody::Text("Deleted".into())
        );
    }

    #[test]
    fn test_api_request_json_body() {
        let request = ApiRequest::patch("/api/task/7/")
            .json(&serde_json::json!({"status": "doing"}))
            .unwrap();
        assert_eq!(request.method(), &Method::PATCH);
        assert_eq!(request.path(), "/api/task/7/");
        assert_eq!(
            request.body,
            Some(RequestBody::Json(br#"{"status":"doing"}"#.to_vec()))
        );
    }
}
