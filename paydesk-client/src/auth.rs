//! Login/logout orchestration over the auth API and the session store

use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::error::ErrorReport;
use crate::http::SessionEvent;
use crate::session::SessionStore;
use crate::types::{LoginRequest, User};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Login was rejected or could not be completed; carries the display
    /// message
    #[error("{0}")]
    Login(String),
}

/// Authenticated-or-not state for the running process
pub struct AuthController {
    api: AuthApi,
    session: Arc<SessionStore>,
    user: RwLock<Option<User>>,
}

impl AuthController {
    /// Create the controller and load any persisted session
    pub fn new(api: AuthApi, session: Arc<SessionStore>) -> Self {
        let controller = Self {
            api,
            session,
            user: RwLock::new(None),
        };
        controller.reload();
        controller
    }

    /// Re-read the session store.
    ///
    /// Authenticated only when both a user record and an access token are
    /// stored.
    pub fn reload(&self) {
        let snapshot = self.session.snapshot();
        let user = if snapshot.is_authenticated() {
            snapshot.user
        } else {
            if snapshot.user.is_some() || snapshot.access_token.is_some() {
                debug!("Incomplete stored session ignored");
            }
            None
        };
        self.set_user(user);
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().map(|u| u.clone()).unwrap_or(None)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<User, AuthError> {
        debug!(username = %credentials.username, "Logging in");

        let tokens = self.api.login(credentials).await.map_err(|e| {
            let report = ErrorReport::from(&e);
            warn!(error = %e, "Login failed");
            AuthError::Login(report.message)
        })?;

        self.session.set_token(&tokens.access);
        self.session.set_refresh(&tokens.refresh);
        self.session.set_user(&tokens.user);
        self.set_user(Some(tokens.user.clone()));

        info!(user_id = tokens.user.id, "Logged in");
        Ok(tokens.user)
    }

    /// Drop the local session. Never fails.
    pub fn logout(&self) {
        self.session.clear();
        self.set_user(None);
        info!("Logged out");
    }

    /// Tell the server, then drop the local session regardless of the outcome
    pub async fn sign_out(&self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Server-side logout failed");
        }
        self.logout();
    }

    /// Reset in-memory state whenever the client gives up on the session
    pub fn watch(self: &Arc<Self>, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Expired { login_path }) => {
                        info!(%login_path, "Session expired, login required");
                        controller.set_user(None);
                    }
                    Ok(SessionEvent::Refreshed) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Session events lagged");
                        controller.reload();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn set_user(&self, user: Option<User>) {
        match self.user.write() {
            Ok(mut guard) => *guard = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }
}
