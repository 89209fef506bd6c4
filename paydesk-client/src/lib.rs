//! Rust client for the organization payments API
//!
//! Layers, leaves first:
//! - [`session`]: persisted user, access token and refresh token
//! - [`request`]: request descriptors → normalized route, query string, headers
//! - [`http`]: verb operations with one-shot token refresh on 401
//! - [`api`]: typed auth and payment bindings
//! - [`auth`]: login/logout and the authenticated-or-not state
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paydesk_client::{
//!     AuthApi, AuthController, ClientConfig, HttpClient, LoginRequest, PaymentQuery,
//!     PaymentsApi, SessionStore,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(SessionStore::file("/tmp/paydesk/session.json"));
//! let http = Arc::new(HttpClient::new(
//!     ClientConfig::with_base_url("http://127.0.0.1:8000/api"),
//!     session.clone(),
//! )?);
//!
//! let auth = AuthController::new(AuthApi::new(http.clone()), session);
//! auth.login(&LoginRequest::new("alice", "pw")).await?;
//!
//! let payments = PaymentsApi::new(http);
//! let page = payments.list(PaymentQuery::new().page(1)).await?;
//! println!("{} payments", page.count);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod session;
pub mod types;

pub use api::{AuthApi, PaymentQuery, PaymentsApi};
pub use auth::{AuthController, AuthError};
pub use config::ClientConfig;
pub use error::{ApiError, ErrorReport, Result};
pub use http::{ApiResponse, HttpClient, RetryMarker, SessionEvent};
pub use request::{QueryValue, RequestDescriptor, Scalar};
pub use session::{FileStore, KeyValueStore, MemoryStore, Session, SessionStore, StoreError};
pub use types::*;
