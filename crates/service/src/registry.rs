//! Static table mapping message kinds to handler functions.

use std::collections::HashMap;
use std::sync::Arc;

use domain::{Message as _, Variant};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::messagebus::{BusError, ServiceContainer};

/// Type-erased command handler.
pub(crate) type CommandHandlerFn<S> = Arc<
    dyn for<'a> Fn(
            <S as ServiceContainer>::Command,
            &'a mut <S as ServiceContainer>::Context,
        ) -> BoxFuture<
            'a,
            Result<<S as ServiceContainer>::Output, BusError<<S as ServiceContainer>::Error>>,
        > + Send
        + Sync,
>;

/// Type-erased event handler.
pub(crate) type EventHandlerFn<S> = Arc<
    dyn for<'a> Fn(
            <S as ServiceContainer>::Event,
            &'a mut <S as ServiceContainer>::Context,
        ) -> BoxFuture<'a, Result<(), BusError<<S as ServiceContainer>::Error>>>
        + Send
        + Sync,
>;

/// A registered handler and the name it is logged under.
pub(crate) struct Registered<F> {
    pub(crate) name: &'static str,
    pub(crate) handler: F,
}

/// Errors detected while building the handler table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A second handler was registered for a command kind.
    #[error("Duplicate handler for command {kind}: {existing} and {duplicate}")]
    DuplicateCommandHandler {
        kind: String,
        existing: &'static str,
        duplicate: &'static str,
    },

    /// A command kind has no handler.
    #[error("No handler registered for command {kind}")]
    MissingCommandHandler { kind: String },
}

/// Handlers for the commands and events of a service container.
///
/// Built once at startup. Each command kind has at most one handler; each
/// event kind has any number, run in registration order. Once handed to a
/// [`MessageBus`](crate::MessageBus) the table is never mutated.
pub struct HandlerRegistry<S: ServiceContainer> {
    commands: HashMap<<S::Command as domain::Message>::Kind, Registered<CommandHandlerFn<S>>>,
    events: HashMap<<S::Event as domain::Message>::Kind, Vec<Registered<EventHandlerFn<S>>>>,
}

// Forces closures into the higher-ranked signature the table stores.
fn command_fn<S, F>(f: F) -> F
where
    S: ServiceContainer,
    F: for<'a> Fn(S::Command, &'a mut S::Context) -> BoxFuture<'a, Result<S::Output, BusError<S::Error>>>
        + Send
        + Sync
        + 'static,
{
    f
}

fn event_fn<S, F>(f: F) -> F
where
    S: ServiceContainer,
    F: for<'a> Fn(S::Event, &'a mut S::Context) -> BoxFuture<'a, Result<(), BusError<S::Error>>>
        + Send
        + Sync
        + 'static,
{
    f
}

impl<S: ServiceContainer> HandlerRegistry<S> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            events: HashMap::new(),
        }
    }

    /// Registers the handler for the command carrying payload `P`.
    ///
    /// Fails if that command already has a handler.
    pub fn on_command<P, H>(&mut self, handler: H) -> Result<&mut Self, RegistryError>
    where
        P: Variant<S::Command>,
        H: for<'a> Fn(P, &'a mut S::Context) -> BoxFuture<'a, Result<S::Output, S::Error>>
            + Send
            + Sync
            + 'static,
    {
        let kind = P::kind();
        let name = std::any::type_name::<H>();

        if let Some(existing) = self.commands.get(&kind) {
            return Err(RegistryError::DuplicateCommandHandler {
                kind: format!("{kind:?}"),
                existing: existing.name,
                duplicate: name,
            });
        }

        let erased = command_fn::<S, _>(move |command, context| match P::extract(command) {
            Ok(payload) => {
                let call = handler(payload, context);
                Box::pin(async move { call.await.map_err(BusError::Handler) })
            }
            Err(other) => {
                let kind = format!("{:?}", other.kind());
                Box::pin(async move { Err(BusError::UnroutableMessage { kind }) })
            }
        });

        self.commands.insert(
            kind,
            Registered {
                name,
                handler: Arc::new(erased),
            },
        );
        Ok(self)
    }

    /// Appends a handler for the event carrying payload `P`.
    pub fn on_event<P, H>(&mut self, handler: H) -> &mut Self
    where
        P: Variant<S::Event>,
        H: for<'a> Fn(P, &'a mut S::Context) -> BoxFuture<'a, Result<(), S::Error>>
            + Send
            + Sync
            + 'static,
    {
        let kind = P::kind();
        let name = std::any::type_name::<H>();

        let erased = event_fn::<S, _>(move |event, context| match P::extract(event) {
            Ok(payload) => {
                let call = handler(payload, context);
                Box::pin(async move { call.await.map_err(BusError::Handler) })
            }
            Err(other) => {
                let kind = format!("{:?}", other.kind());
                Box::pin(async move { Err(BusError::UnroutableMessage { kind }) })
            }
        });

        self.events.entry(kind).or_default().push(Registered {
            name,
            handler: Arc::new(erased),
        });
        self
    }

    /// Checks that every command kind has a handler.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for kind in <S::Command as domain::Message>::kinds() {
            if !self.commands.contains_key(kind) {
                return Err(RegistryError::MissingCommandHandler {
                    kind: format!("{kind:?}"),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn command_handler(
        &self,
        kind: <S::Command as domain::Message>::Kind,
    ) -> Option<&Registered<CommandHandlerFn<S>>> {
        self.commands.get(&kind)
    }

    pub(crate) fn event_handlers(
        &self,
        kind: <S::Event as domain::Message>::Kind,
    ) -> &[Registered<EventHandlerFn<S>>] {
        self.events.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the number of handlers registered for an event kind.
    pub fn event_handler_count(&self, kind: <S::Event as domain::Message>::Kind) -> usize {
        self.event_handlers(kind).len()
    }
}

impl<S: ServiceContainer> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
