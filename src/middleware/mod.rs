//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Short-circuit requests (reject unauthenticated)

/// Session JWT authentication middleware
pub mod auth;
