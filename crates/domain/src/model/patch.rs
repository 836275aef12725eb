//! Patch (OS release) aggregate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Changeset, EventQueue, Upsert};
use crate::events::Event;

/// An operating system release, keyed by its build string (e.g. `21A329`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    build: String,
    os: String,
    name: String,
    version: String,
    major: u32,
    minor: u32,
    patch: u32,
    released: Option<NaiveDate>,
    #[serde(default)]
    cve_ids: Vec<String>,
    #[serde(default)]
    device_identifiers: Vec<String>,

    #[serde(skip)]
    events: EventQueue<Event>,
}

impl Patch {
    pub fn build(&self) -> &str {
        &self.build
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns `(major, minor, patch)`.
    pub fn semver(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }

    pub fn released(&self) -> Option<NaiveDate> {
        self.released
    }

    /// CVEs fixed by this release.
    pub fn cve_ids(&self) -> &[String] {
        &self.cve_ids
    }

    /// Devices this release ships to.
    pub fn device_identifiers(&self) -> &[String] {
        &self.device_identifiers
    }
}

impl Aggregate for Patch {
    type Key = String;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "patches"
    }

    fn key(&self) -> String {
        self.build.clone()
    }

    fn events(&self) -> &EventQueue<Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Event> {
        &mut self.events
    }
}

/// Field values for upserting a [`Patch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchChanges {
    pub build: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_identifiers: Option<Vec<String>>,
}

impl PatchChanges {
    /// Creates an empty changeset for the given build.
    pub fn new(build: impl Into<String>) -> Self {
        Self {
            build: build.into(),
            ..Self::default()
        }
    }
}

impl Changeset<Patch> for PatchChanges {
    fn key(&self) -> String {
        self.build.clone()
    }
}

impl Upsert for Patch {
    type Changes = PatchChanges;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changeset_serializes_only_set_fields() {
        let changes = PatchChanges {
            name: Some("iOS 17".to_string()),
            ..PatchChanges::new("21A329")
        };

        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json, serde_json::json!({"build": "21A329", "name": "iOS 17"}));
    }

    #[test]
    fn relation_lists_default_to_empty() {
        let patch: Patch = serde_json::from_value(serde_json::json!({
            "build": "21A329",
            "os": "iOS",
            "name": "iOS 17",
            "version": "17.0",
            "major": 17,
            "minor": 0,
            "patch": 0,
        }))
        .unwrap();

        assert!(patch.cve_ids().is_empty());
        assert_eq!(patch.semver(), (17, 0, 0));
        assert_eq!(patch.released(), None);
    }
}
