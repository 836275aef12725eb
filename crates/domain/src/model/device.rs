//! Device and manufacturer aggregates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Changeset, EventQueue, Upsert};
use crate::events::Event;

/// A device manufacturer, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manufacturer {
    name: String,

    #[serde(skip)]
    events: EventQueue<Event>,
}

impl Manufacturer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: EventQueue::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Aggregate for Manufacturer {
    type Key = String;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "manufacturers"
    }

    fn key(&self) -> String {
        self.name.clone()
    }

    fn events(&self) -> &EventQueue<Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Event> {
        &mut self.events
    }
}

/// Hardware details of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub arch: String,
    pub boards: Vec<String>,
    pub soc: String,
}

/// A device model, keyed by its vendor identifier (e.g. `iPhone15,2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    identifier: String,
    manufacturer: String,
    name: String,
    models: Vec<String>,
    released: Option<NaiveDate>,
    discontinued: Option<NaiveDate>,
    hardware_info: HardwareInfo,

    #[serde(skip)]
    events: EventQueue<Event>,
}

impl Device {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn released(&self) -> Option<NaiveDate> {
        self.released
    }

    pub fn discontinued(&self) -> Option<NaiveDate> {
        self.discontinued
    }

    pub fn hardware_info(&self) -> &HardwareInfo {
        &self.hardware_info
    }
}

impl Aggregate for Device {
    type Key = String;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "devices"
    }

    fn key(&self) -> String {
        self.identifier.clone()
    }

    fn events(&self) -> &EventQueue<Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Event> {
        &mut self.events
    }
}

/// Field values for upserting a [`Device`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceChanges {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discontinued: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_info: Option<HardwareInfo>,
}

impl DeviceChanges {
    /// Creates an empty changeset for the given identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }
}

impl Changeset<Device> for DeviceChanges {
    fn key(&self) -> String {
        self.identifier.clone()
    }
}

impl Upsert for Device {
    type Changes = DeviceChanges;
}
