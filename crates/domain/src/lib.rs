//! Domain layer for the hbit service.
//!
//! This crate provides:
//! - the `Message` and `Variant` traits the message bus routes on
//! - the `Aggregate` trait and the per-aggregate `EventQueue`
//! - `Changeset`/`Upsert` for merge-style writes keyed by a natural key
//! - the user, device, patch and vulnerability aggregates
//! - the closed `Command` and `Event` enums

pub mod aggregate;
pub mod commands;
pub mod events;
pub mod message;
pub mod model;

pub use aggregate::{Aggregate, Changeset, EventQueue, Upsert};
pub use commands::{
    AuthenticateUser, Command, CommandKind, CreateUser, DeleteUser, LogInUser,
    RecordCapec, RecordCve, RecordCwe, RecordDevice, RecordPatch, RecoverUserPassword,
    ResetPassword, UpdateUser, UpdateUserPassword,
};
pub use events::{Event, EventKind, NotifyNewAccount, NotifyRecoverPassword};
pub use message::{Message, Variant};
pub use model::{
    AttackStep, Capec, CapecChanges, Cve, CveChanges, Cvss, Cwe, CweChanges, DetectionMethod,
    Device, DeviceChanges, HardwareInfo, Manufacturer, Mitigation, Patch, PatchChanges, Skill,
    User,
};
