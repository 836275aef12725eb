//! Service layer for the hbit backend.
//!
//! This crate provides:
//! - `MessageBus`: FIFO, breadth-first dispatch of commands and events
//! - `HandlerRegistry`: the static command/event handler table
//! - `UnitOfWork`: transactional scopes over the record store that
//!   harvest events from every aggregate they touch
//! - `Repository`: identity-mapped access to one aggregate type, with
//!   merge-style upserts
//! - the concrete handlers, collaborators and bootstrap wiring

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod messagebus;
pub mod registry;
pub mod reply;
pub mod repository;
pub mod seen;
pub mod services;
pub mod unit_of_work;

pub use bootstrap::{BootstrapError, Context, Services, bootstrap, bus};
pub use config::Settings;
pub use error::{RepositoryError, Result, ServiceError};
pub use messagebus::{BusError, HandlerContext, Message, MessageBus, ServiceContainer};
pub use registry::{HandlerRegistry, RegistryError};
pub use reply::{Reply, UserView};
pub use repository::Repository;
pub use seen::SeenTracker;
pub use unit_of_work::{UnitOfWork, UnitOfWorkScope};
