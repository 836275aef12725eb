//! The message bus: routes commands and events to their handlers.

use std::collections::VecDeque;
use std::sync::Arc;

use domain::Message as _;
use thiserror::Error;

use crate::registry::HandlerRegistry;

/// A message accepted by the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<C, E> {
    Command(C),
    Event(E),
}

impl From<domain::Command> for Message<domain::Command, domain::Event> {
    fn from(command: domain::Command) -> Self {
        Message::Command(command)
    }
}

impl From<domain::Event> for Message<domain::Command, domain::Event> {
    fn from(event: domain::Event) -> Self {
        Message::Event(event)
    }
}

/// Per-attempt state handed to a handler, owning its unit of work.
pub trait HandlerContext: Send {
    type Event;

    /// Drains the events recorded on aggregates the handler touched.
    fn collect_new_events(&mut self) -> Vec<Self::Event>;
}

/// Supplies a fresh handler context for every dispatch attempt.
pub trait ServiceContainer: Send + Sync + 'static {
    type Command: domain::Message;
    type Event: domain::Message + Clone;
    type Output: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;
    type Context: HandlerContext<Event = Self::Event> + 'static;

    /// Returns a new context with its own unit of work.
    fn context(&self) -> Self::Context;
}

/// Errors returned by [`MessageBus::handle`].
#[derive(Debug, Error)]
pub enum BusError<E> {
    /// No handler is registered for a command kind.
    #[error("No handler registered for command {kind}")]
    MissingHandler { kind: String },

    /// A handler was handed a message of another kind.
    #[error("Handler received unroutable message {kind}")]
    UnroutableMessage { kind: String },

    /// The command handler failed.
    #[error(transparent)]
    Handler(E),
}

impl<E> BusError<E> {
    /// Returns the handler error, if this is one.
    pub fn into_handler_error(self) -> Option<E> {
        match self {
            BusError::Handler(error) => Some(error),
            _ => None,
        }
    }
}

/// Dispatches messages and feeds the events handlers produce back in.
///
/// Each call to [`handle`](Self::handle) owns its own FIFO queue. Events
/// emitted while handling a message are appended to the back of that queue,
/// so processing is breadth-first and causes run before their effects.
pub struct MessageBus<S: ServiceContainer> {
    services: Arc<S>,
    registry: Arc<HandlerRegistry<S>>,
}

impl<S: ServiceContainer> Clone for MessageBus<S> {
    fn clone(&self) -> Self {
        Self {
            services: Arc::clone(&self.services),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: ServiceContainer> MessageBus<S> {
    pub fn new(services: Arc<S>, registry: HandlerRegistry<S>) -> Self {
        Self {
            services,
            registry: Arc::new(registry),
        }
    }

    /// Returns the service container handlers run against.
    pub fn services(&self) -> &Arc<S> {
        &self.services
    }

    /// Handles a message and every event it leads to.
    ///
    /// Returns the output of the last command handled, or None if only
    /// events were processed. A failing command handler stops processing
    /// and its error is returned; failing event handlers are logged and
    /// skipped.
    #[tracing::instrument(skip_all)]
    pub async fn handle(
        &self,
        message: impl Into<Message<S::Command, S::Event>>,
    ) -> Result<Option<S::Output>, BusError<S::Error>> {
        let mut queue = VecDeque::from([message.into()]);
        let mut result = None;

        while let Some(message) = queue.pop_front() {
            match message {
                Message::Event(event) => self.handle_event(event, &mut queue).await,
                Message::Command(command) => {
                    result = Some(self.handle_command(command, &mut queue).await?);
                }
            }
        }

        Ok(result)
    }

    async fn handle_event(
        &self,
        event: S::Event,
        queue: &mut VecDeque<Message<S::Command, S::Event>>,
    ) {
        let kind = event.kind();
        metrics::counter!("messagebus_events_total").increment(1);

        let handlers = self.registry.event_handlers(kind);
        if handlers.is_empty() {
            tracing::debug!(event = ?kind, "no handlers for event");
            return;
        }

        for registered in handlers {
            let mut context = self.services.context();
            match (registered.handler)(event.clone(), &mut context).await {
                Ok(()) => {
                    tracing::debug!(handler = registered.name, event = ?kind, "handled event");
                }
                Err(error) => {
                    metrics::counter!("messagebus_event_handler_failures_total").increment(1);
                    tracing::error!(
                        handler = registered.name,
                        event = ?kind,
                        content = ?event,
                        error = %error,
                        "exception handling event"
                    );
                }
            }
            queue.extend(context.collect_new_events().into_iter().map(Message::Event));
        }
    }

    async fn handle_command(
        &self,
        command: S::Command,
        queue: &mut VecDeque<Message<S::Command, S::Event>>,
    ) -> Result<S::Output, BusError<S::Error>> {
        let kind = command.kind();
        metrics::counter!("messagebus_commands_total").increment(1);

        let Some(registered) = self.registry.command_handler(kind) else {
            tracing::error!(command = ?kind, "no handler registered for command");
            return Err(BusError::MissingHandler {
                kind: format!("{kind:?}"),
            });
        };

        tracing::debug!(handler = registered.name, command = ?command, "handling command");
        let mut context = self.services.context();
        match (registered.handler)(command, &mut context).await {
            Ok(output) => {
                tracing::debug!(handler = registered.name, command = ?kind, "handled command");
                queue.extend(context.collect_new_events().into_iter().map(Message::Event));
                Ok(output)
            }
            Err(error) => {
                tracing::error!(
                    handler = registered.name,
                    command = ?kind,
                    error = %error,
                    "exception handling command"
                );
                Err(error)
            }
        }
    }
}
