//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and calls to external APIs.

pub mod analytics;
pub mod billing_service;
pub mod credit_service;
pub mod job_service;
pub mod otp_service;
pub mod profile_service;
pub mod session;
pub mod signature;

/// Clients for external APIs
pub mod generation_provider;
pub mod mailer;
pub mod oauth;
pub mod payment_client;
pub mod storage;
