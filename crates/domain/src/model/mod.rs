//! Aggregates persisted through the repositories.

mod device;
mod patch;
mod user;
mod vulnerability;

pub use device::{Device, DeviceChanges, HardwareInfo, Manufacturer};
pub use patch::{Patch, PatchChanges};
pub use user::User;
pub use vulnerability::{
    AttackStep, Capec, CapecChanges, Cve, CveChanges, Cvss, Cwe, CweChanges, DetectionMethod,
    Mitigation, Skill,
};
