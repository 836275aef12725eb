//! Collaborators reached from inside handlers.

pub mod email;
pub mod security;
pub mod token;

pub use email::{EmailError, EmailMessage, EmailSender, InMemoryEmailSender};
pub use security::{Argon2PasswordHasher, PasswordHashError, PasswordHasher};
pub use token::{AccessToken, InMemoryTokenIssuer, TokenIssuer};
