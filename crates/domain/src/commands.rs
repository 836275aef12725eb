//! Commands for the hbit service.
//!
//! Commands are requests to change state. Every command kind is handled by
//! exactly one handler, which may return a reply.

use common::{Email, Secret, UserId};
use serde::{Deserialize, Serialize};

use crate::model::{CapecChanges, CveChanges, CweChanges, DeviceChanges, PatchChanges};

/// Register a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: Email,
    pub name: Option<String>,
    pub password: Secret,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Change the name and/or email of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Change a password, given the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserPassword {
    pub id: UserId,
    pub current_password: Secret,
    pub new_password: Secret,
}

/// Exchange credentials for an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInUser {
    pub email: Email,
    pub password: Secret,
}

/// Resolve an access token to the account it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateUser {
    pub token: Secret,
}

/// Ask for a password recovery email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverUserPassword {
    pub email: Email,
}

/// Set a new password using a recovery token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPassword {
    pub token: Secret,
    pub new_password: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUser {
    pub id: UserId,
}

/// Upsert a device and its manufacturer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDevice {
    pub changes: DeviceChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPatch {
    pub changes: PatchChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCve {
    pub changes: CveChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCwe {
    pub changes: CweChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCapec {
    pub changes: CapecChanges,
}

crate::messages! {
    /// Commands accepted by the message bus.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data")]
    pub enum Command / CommandKind {
        CreateUser,
        UpdateUser,
        UpdateUserPassword,
        LogInUser,
        AuthenticateUser,
        RecoverUserPassword,
        ResetPassword,
        DeleteUser,
        RecordDevice,
        RecordPatch,
        RecordCve,
        RecordCwe,
        RecordCapec,
    }
}
