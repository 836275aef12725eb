//! User aggregate.

use common::{Email, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, EventQueue};
use crate::events::{Event, NotifyNewAccount, NotifyRecoverPassword};

/// A user account, keyed by its email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    email: Email,
    name: Option<String>,
    hashed_password: String,
    is_active: bool,
    is_superuser: bool,

    #[serde(skip)]
    events: EventQueue<Event>,
}

impl User {
    /// Creates a new, active user.
    pub fn new(
        email: Email,
        name: Option<String>,
        hashed_password: impl Into<String>,
        is_superuser: bool,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            name,
            hashed_password: hashed_password.into(),
            is_active: true,
            is_superuser,
            events: EventQueue::new(),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn hashed_password(&self) -> &str {
        &self.hashed_password
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    /// Records that a welcome email should be sent to the new account.
    pub fn send_verification_email(&mut self) {
        self.events.record(
            NotifyNewAccount {
                email: self.email.clone(),
            }
            .into(),
        );
    }

    /// Records that a password recovery email should be sent.
    pub fn send_password_recovery_email(&mut self) {
        self.events.record(
            NotifyRecoverPassword {
                email: self.email.clone(),
            }
            .into(),
        );
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn set_hashed_password(&mut self, hashed_password: impl Into<String>) {
        self.hashed_password = hashed_password.into();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Returns a copy of this account under a new email address.
    ///
    /// The email is the natural key, so changing it means storing the account
    /// under a new key. The copy starts with no pending events.
    pub fn moved_to(&self, email: Email) -> Self {
        Self {
            id: self.id,
            email,
            name: self.name.clone(),
            hashed_password: self.hashed_password.clone(),
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            events: EventQueue::new(),
        }
    }
}

impl Aggregate for User {
    type Key = Email;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "users"
    }

    fn key(&self) -> Email {
        self.email.clone()
    }

    fn events(&self) -> &EventQueue<Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Event> {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, Message};

    fn user() -> User {
        User::new(
            Email::parse("a@b.com").unwrap(),
            Some("A".to_string()),
            "hash",
            false,
        )
    }

    #[test]
    fn new_user_is_active_with_no_events() {
        let user = user();
        assert!(user.is_active());
        assert!(user.events().is_empty());
    }

    #[test]
    fn verification_email_records_event() {
        let mut user = user();
        user.send_verification_email();

        let events = user.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::NotifyNewAccount);
        assert!(user.events().is_empty());
    }

    #[test]
    fn recovery_email_records_event() {
        let mut user = user();
        user.send_password_recovery_email();

        assert_eq!(
            user.events().pending()[0].kind(),
            EventKind::NotifyRecoverPassword
        );
    }

    #[test]
    fn events_are_not_serialized() {
        let mut user = user();
        user.send_verification_email();

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("events").is_none());

        let restored: User = serde_json::from_value(json).unwrap();
        assert!(restored.events().is_empty());
        assert_eq!(restored.id(), user.id());
    }

    #[test]
    fn moved_to_keeps_identity_but_not_events() {
        let mut user = user();
        user.send_verification_email();

        let moved = user.moved_to(Email::parse("new@b.com").unwrap());
        assert_eq!(moved.id(), user.id());
        assert_eq!(moved.key().as_str(), "new@b.com");
        assert!(moved.events().is_empty());
    }
}
