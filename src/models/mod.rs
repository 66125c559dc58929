//! Data models representing database entities and API bodies.

pub mod credit;
pub mod effect;
pub mod job;
pub mod otp;
pub mod plan;
pub mod profile;
pub mod subscription;
