#![forbid(unsafe_code)]

pub mod alert;
pub mod common;
pub mod dashboard;
pub mod issuance;
pub mod lenient;
pub mod location;
pub mod user;

pub use common::{ContractViolation, SchemaVersion, Validate};
