//! Values returned by command handlers.

use common::{Email, UserId};
use domain::User;
use serde::{Deserialize, Serialize};

use crate::services::AccessToken;

/// Public view of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            email: user.email().clone(),
            name: user.name().map(str::to_string),
            is_active: user.is_active(),
            is_superuser: user.is_superuser(),
        }
    }
}

/// Output of a command handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Reply {
    None,
    Token(AccessToken),
    User(UserView),
}

impl Reply {
    pub fn into_token(self) -> Option<AccessToken> {
        match self {
            Reply::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn into_user(self) -> Option<UserView> {
        match self {
            Reply::User(user) => Some(user),
            _ => None,
        }
    }
}
