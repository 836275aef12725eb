//! Domain events.
//!
//! Events announce something that already happened. They are recorded by
//! aggregates and may have any number of handlers, including none.

use common::Email;
use serde::{Deserialize, Serialize};

/// A new account was created and should receive a welcome email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyNewAccount {
    pub email: Email,
}

/// A user asked to recover their password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyRecoverPassword {
    pub email: Email,
}

crate::messages! {
    /// Events that can be recorded by aggregates.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data")]
    pub enum Event / EventKind {
        NotifyNewAccount,
        NotifyRecoverPassword,
    }
}
