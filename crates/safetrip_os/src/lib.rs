#![forbid(unsafe_code)]

pub mod alerts;
pub mod auth;
pub mod dashboard;
pub mod error;
pub mod issuance;
pub mod location;

pub use error::{AuthError, ServiceError};
