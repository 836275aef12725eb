//! Shared identifier and value types.

pub mod types;

pub use types::{Email, InvalidEmail, Secret, UserId};
