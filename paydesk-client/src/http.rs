//! HTTP client core
//!
//! Every call goes through the same pipeline:
//!
//! 1. build: `RequestDescriptor` → `PreparedRequest` (URL, headers, body)
//! 2. intercept: re-inject the stored bearer token for authenticated calls
//! 3. send, then on 401 run the refresh protocol at most once per call
//!
//! The refresh call itself is issued bare, outside this pipeline, so a
//! failing refresh can never trigger another refresh.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, REFRESH_ROUTE};
use crate::error::{ApiError, Result};
use crate::request::{PreparedRequest, RequestDescriptor};
use crate::session::SessionStore;
use crate::types::{TokenRefreshRequest, TokenRefreshResponse};

/// Session changes made by the client on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new access token was obtained and stored
    Refreshed,
    /// Refresh failed and the session was cleared; the user has to log in
    /// again at `login_path`
    Expired { login_path: String },
}

/// Decoded response body with status metadata
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}

/// Set once a call has been through a refresh-and-retry cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryMarker {
    retried: bool,
}

impl RetryMarker {
    pub fn is_marked(&self) -> bool {
        self.retried
    }

    fn mark(&mut self) {
        self.retried = true;
    }
}

/// HTTP client for the payments API
pub struct HttpClient {
    config: ClientConfig,
    http: Client,
    session: Arc<SessionStore>,
    /// Serializes refresh attempts so concurrent 401s share one refresh call
    refresh_gate: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl HttpClient {
    pub fn new(config: ClientConfig, session: Arc<SessionStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            config,
            http,
            session,
            refresh_gate: Mutex::new(()),
            events,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ==================== Verbs ====================

    pub async fn get<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<ApiResponse<T>> {
        self.send(Method::GET, request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<ApiResponse<T>> {
        self.send(Method::DELETE, request).await
    }

    pub async fn post<T, B>(&self, request: RequestDescriptor, body: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, request.body(body)?).await
    }

    pub async fn put<T, B>(&self, request: RequestDescriptor, body: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PUT, request.body(body)?).await
    }

    pub async fn patch<T, B>(&self, request: RequestDescriptor, body: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PATCH, request.body(body)?).await
    }

    /// Issue `request`, refreshing the access token once on 401
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        request: RequestDescriptor,
    ) -> Result<ApiResponse<T>> {
        let mut prepared = request.prepare(method, &self.config, &self.session)?;
        let mut marker = RetryMarker::default();

        loop {
            self.intercept(&mut prepared)?;
            let response = self.execute(&prepared).await?;
            let status = response.status();

            if status.is_success() {
                return decode(response).await;
            }

            let raw = response.bytes().await?;
            let error = ApiError::from_status(status, &raw);

            if status == StatusCode::UNAUTHORIZED
                && prepared.requires_auth
                && !marker.is_marked()
                && !prepared.is_refresh_call()
            {
                marker.mark();
                debug!(route = %prepared.route, "Got 401, attempting token refresh");

                let stale = prepared.bearer_token().map(str::to_string);
                match self.refresh_access_token(stale).await? {
                    Some(token) => {
                        prepared.set_bearer(&token)?;
                        continue;
                    }
                    None => return Err(error),
                }
            }

            return Err(error);
        }
    }

    // ==================== Pipeline stages ====================

    fn intercept(&self, prepared: &mut PreparedRequest) -> Result<()> {
        if prepared.requires_auth {
            if let Some(token) = self.session.get_token() {
                prepared.set_bearer(&token)?;
            }
        }
        Ok(())
    }

    async fn execute(&self, prepared: &PreparedRequest) -> Result<reqwest::Response> {
        debug!(method = %prepared.method, url = %prepared.url, "Sending request");

        let mut builder = self
            .http
            .request(prepared.method.clone(), &prepared.url)
            .headers(prepared.headers.clone());

        if let Some(ref body) = prepared.body {
            if !prepared.headers.contains_key(header::CONTENT_TYPE) {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            builder = builder.body(serde_json::to_vec(body)?);
        }

        Ok(builder.send().await?)
    }

    /// Obtain a usable access token after a 401.
    ///
    /// `stale` is the token the failed call carried. If the stored token has
    /// changed since, another call already refreshed and that token is
    /// returned without a new refresh. `Ok(None)` means no refresh token is
    /// stored.
    async fn refresh_access_token(&self, stale: Option<String>) -> Result<Option<String>> {
        let _guard = self.refresh_gate.lock().await;

        if let Some(current) = self.session.get_token() {
            if stale.as_deref() != Some(current.as_str()) {
                debug!("Access token already refreshed by a concurrent request");
                return Ok(Some(current));
            }
        }

        let Some(refresh) = self.session.get_refresh() else {
            debug!("No refresh token stored, giving up on 401");
            return Ok(None);
        };

        match self.request_access_token(refresh).await {
            Ok(access) => {
                self.session.set_token(&access);
                info!("Access token refreshed");
                let _ = self.events.send(SessionEvent::Refreshed);
                Ok(Some(access))
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.session.clear();
                let _ = self.events.send(SessionEvent::Expired {
                    login_path: self.config.login_path.clone(),
                });
                Err(e)
            }
        }
    }

    /// Bare refresh call, outside the interceptor pipeline
    async fn request_access_token(&self, refresh: String) -> Result<String> {
        let url = self.config.url_for(REFRESH_ROUTE);

        let response = self
            .http
            .post(&url)
            .json(&TokenRefreshRequest { refresh })
            .send()
            .await?;

        let status = response.status();
        let raw = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &raw));
        }

        let body: TokenRefreshResponse = serde_json::from_slice(&raw)?;
        Ok(body.access)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<ApiResponse<T>> {
    let status = response.status();
    let headers = response.headers().clone();
    let raw = response.bytes().await?;

    // Empty bodies (204, bare 200) decode as `null`
    let data = if raw.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"null")?
    } else {
        serde_json::from_slice(&raw)?
    };

    Ok(ApiResponse {
        status,
        headers,
        data,
    })
}
