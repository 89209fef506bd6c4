//! Auth endpoint bindings

use std::sync::Arc;

use crate::config::REFRESH_ROUTE;
use crate::error::Result;
use crate::http::{ApiResponse, HttpClient};
use crate::request::RequestDescriptor;
use crate::types::{LoginRequest, TokenRefreshRequest, TokenRefreshResponse, TokenResponse};

const LOGIN_ROUTE: &str = "auth/login/";
const LOGOUT_ROUTE: &str = "auth/logout/";

#[derive(Clone)]
pub struct AuthApi {
    http: Arc<HttpClient>,
}

impl AuthApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub fn client(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// `POST auth/login/`, sent without a bearer token
    pub async fn login(&self, credentials: &LoginRequest) -> Result<TokenResponse> {
        let response = self
            .http
            .post(RequestDescriptor::new(LOGIN_ROUTE), credentials)
            .await?;
        Ok(response.data)
    }

    /// `POST auth/refresh/` through the regular pipeline.
    ///
    /// A 401 here is returned as-is; the client never refreshes a refresh.
    pub async fn refresh(&self, refresh: &str) -> Result<TokenRefreshResponse> {
        let body = TokenRefreshRequest {
            refresh: refresh.to_string(),
        };
        let response = self
            .http
            .post(RequestDescriptor::new(REFRESH_ROUTE), &body)
            .await?;
        Ok(response.data)
    }

    /// `POST auth/logout/`, the server-side half of signing out
    pub async fn logout(&self) -> Result<()> {
        let request = RequestDescriptor::new(LOGOUT_ROUTE).authenticated();
        let _: ApiResponse<serde_json::Value> =
            self.http.post(request, &serde_json::json!({})).await?;
        Ok(())
    }
}
