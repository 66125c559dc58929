//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, cookies)
//! 2. Delegates to a service
//! 3. Returns the `{ success, data }` envelope or an `AppError`

/// Email OTP and OAuth sign-in
pub mod auth;
pub mod billing;
pub mod effects;
pub mod health;
pub mod jobs;
pub mod profile;
pub mod share;
pub mod uploads;
/// Payment processor and generation provider callbacks
pub mod webhooks;
