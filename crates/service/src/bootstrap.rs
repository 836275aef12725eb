//! Wiring: the service container, handler contexts and bus construction.

use std::sync::Arc;

use domain::{Command, Event};
use store::{InMemoryStore, PostgresStore, Store, StoreError};
use thiserror::Error;

use crate::config::Settings;
use crate::error::ServiceError;
use crate::handlers;
use crate::messagebus::{HandlerContext, MessageBus, ServiceContainer};
use crate::registry::RegistryError;
use crate::reply::Reply;
use crate::services::{
    Argon2PasswordHasher, EmailSender, InMemoryEmailSender, InMemoryTokenIssuer, PasswordHasher,
    TokenIssuer,
};
use crate::unit_of_work::UnitOfWork;

/// Errors that can occur while starting the service.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Shared collaborators every handler runs against.
#[derive(Clone)]
pub struct Services {
    store: Arc<dyn Store>,
    settings: Arc<Settings>,
    email_sender: Arc<dyn EmailSender>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
}

impl Services {
    /// Creates a container with in-memory email and token collaborators.
    pub fn new(store: Arc<dyn Store>, settings: Settings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            email_sender: Arc::new(InMemoryEmailSender::new()),
            hasher: Arc::new(Argon2PasswordHasher::new()),
            tokens: Arc::new(InMemoryTokenIssuer::new()),
        }
    }

    pub fn with_email_sender(mut self, email_sender: Arc<dyn EmailSender>) -> Self {
        self.email_sender = email_sender;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenIssuer>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tokens(&self) -> &Arc<dyn TokenIssuer> {
        &self.tokens
    }
}

impl ServiceContainer for Services {
    type Command = Command;
    type Event = Event;
    type Output = Reply;
    type Error = ServiceError;
    type Context = Context;

    fn context(&self) -> Context {
        Context {
            uow: UnitOfWork::new(Arc::clone(&self.store)),
            settings: Arc::clone(&self.settings),
            email_sender: Arc::clone(&self.email_sender),
            hasher: Arc::clone(&self.hasher),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

/// What a single handler invocation gets: its own unit of work plus the
/// shared collaborators.
pub struct Context {
    pub uow: UnitOfWork,
    pub settings: Arc<Settings>,
    pub email_sender: Arc<dyn EmailSender>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenIssuer>,
}

impl HandlerContext for Context {
    type Event = Event;

    fn collect_new_events(&mut self) -> Vec<Event> {
        self.uow.collect_new_events()
    }
}

/// Builds a bus over `services` with every command and event handler.
pub fn bus(services: Services) -> Result<MessageBus<Services>, RegistryError> {
    Ok(MessageBus::new(Arc::new(services), handlers::registry()?))
}

/// Starts the service from settings.
///
/// Uses Postgres when `database_url` is set, running pending migrations,
/// and an in-memory store otherwise.
#[tracing::instrument(skip_all)]
pub async fn bootstrap(settings: Settings) -> Result<MessageBus<Services>, BootstrapError> {
    let store: Arc<dyn Store> = match settings.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.run_migrations().await?;
            tracing::info!("using postgres record store");
            Arc::new(store)
        }
        None => {
            tracing::info!("using in-memory record store");
            Arc::new(InMemoryStore::new())
        }
    };

    Ok(bus(Services::new(store, settings))?)
}
