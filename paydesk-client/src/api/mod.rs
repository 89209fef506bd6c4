//! Typed bindings for the auth and payment endpoints

mod auth;
mod payments;

pub use auth::AuthApi;
pub use payments::{PaymentQuery, PaymentsApi};
