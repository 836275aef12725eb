//! CVE, CWE and CAPEC aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Changeset, EventQueue, Upsert};
use crate::events::Event;

/// CVSS scoring of a CVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cvss {
    pub version: String,
    pub vector: String,
    pub score: f64,
    pub exploitability_score: f64,
    pub impact_score: f64,
}

/// A published vulnerability, keyed by its CVE id (e.g. `CVE-2024-23222`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cve {
    cve_id: String,
    description: String,
    published: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    cvss: Cvss,
    #[serde(default)]
    cwe_ids: Vec<u32>,

    #[serde(skip)]
    events: EventQueue<Event>,
}

impl Cve {
    pub fn cve_id(&self) -> &str {
        &self.cve_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn published(&self) -> DateTime<Utc> {
        self.published
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn cvss(&self) -> &Cvss {
        &self.cvss
    }

    pub fn cwe_ids(&self) -> &[u32] {
        &self.cwe_ids
    }
}

impl Aggregate for Cve {
    type Key = String;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "cves"
    }

    fn key(&self) -> String {
        self.cve_id.clone()
    }

    fn events(&self) -> &EventQueue<Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Event> {
        &mut self.events
    }
}

/// Field values for upserting a [`Cve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CveChanges {
    pub cve_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss: Option<Cvss>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe_ids: Option<Vec<u32>>,
}

impl CveChanges {
    pub fn new(cve_id: impl Into<String>) -> Self {
        Self {
            cve_id: cve_id.into(),
            ..Self::default()
        }
    }
}

impl Changeset<Cve> for CveChanges {
    fn key(&self) -> String {
        self.cve_id.clone()
    }
}

impl Upsert for Cve {
    type Changes = CveChanges;
}

/// A suggested mitigation for a weakness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitigation {
    pub description: String,
    pub effectiveness: String,
    pub effectiveness_notes: String,
}

/// A way of detecting a weakness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionMethod {
    pub method: String,
    pub description: String,
    pub effectiveness: String,
}

/// A weakness class, keyed by its numeric CWE id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cwe {
    cwe_id: u32,
    name: String,
    description: String,
    #[serde(default)]
    extended_description: String,
    #[serde(default)]
    likelihood_of_exploit: String,
    #[serde(default)]
    background_details: Vec<String>,
    #[serde(default)]
    potential_mitigations: Vec<Mitigation>,
    #[serde(default)]
    detection_methods: Vec<DetectionMethod>,
    #[serde(default)]
    capec_ids: Vec<u32>,

    #[serde(skip)]
    events: EventQueue<Event>,
}

impl Cwe {
    pub fn cwe_id(&self) -> u32 {
        self.cwe_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn extended_description(&self) -> &str {
        &self.extended_description
    }

    pub fn likelihood_of_exploit(&self) -> &str {
        &self.likelihood_of_exploit
    }

    pub fn background_details(&self) -> &[String] {
        &self.background_details
    }

    pub fn potential_mitigations(&self) -> &[Mitigation] {
        &self.potential_mitigations
    }

    pub fn detection_methods(&self) -> &[DetectionMethod] {
        &self.detection_methods
    }

    pub fn capec_ids(&self) -> &[u32] {
        &self.capec_ids
    }
}

impl Aggregate for Cwe {
    type Key = u32;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "cwes"
    }

    fn key(&self) -> u32 {
        self.cwe_id
    }

    fn events(&self) -> &EventQueue<Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Event> {
        &mut self.events
    }
}

/// Field values for upserting a [`Cwe`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CweChanges {
    pub cwe_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likelihood_of_exploit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_mitigations: Option<Vec<Mitigation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_methods: Option<Vec<DetectionMethod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capec_ids: Option<Vec<u32>>,
}

impl CweChanges {
    pub fn new(cwe_id: u32) -> Self {
        Self {
            cwe_id,
            ..Self::default()
        }
    }
}

impl Changeset<Cwe> for CweChanges {
    fn key(&self) -> u32 {
        self.cwe_id
    }
}

impl Upsert for Cwe {
    type Changes = CweChanges;
}

/// One step of an attack pattern's execution flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStep {
    pub step: u32,
    pub phase: String,
    pub description: String,
    pub techniques: Vec<String>,
}

/// A skill an attacker needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub level: String,
    pub description: String,
}

/// An attack pattern, keyed by its numeric CAPEC id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capec {
    capec_id: u32,
    description: String,
    #[serde(default)]
    extended_description: String,
    #[serde(default)]
    likelihood_of_attack: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    execution_flow: Vec<AttackStep>,
    #[serde(default)]
    prerequisites: Vec<String>,
    #[serde(default)]
    skills_required: Vec<Skill>,
    #[serde(default)]
    resources_required: Vec<String>,
    #[serde(default)]
    consequences: Vec<String>,

    #[serde(skip)]
    events: EventQueue<Event>,
}

impl Capec {
    pub fn capec_id(&self) -> u32 {
        self.capec_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn extended_description(&self) -> &str {
        &self.extended_description
    }

    pub fn likelihood_of_attack(&self) -> &str {
        &self.likelihood_of_attack
    }

    pub fn severity(&self) -> &str {
        &self.severity
    }

    pub fn execution_flow(&self) -> &[AttackStep] {
        &self.execution_flow
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    pub fn skills_required(&self) -> &[Skill] {
        &self.skills_required
    }

    pub fn resources_required(&self) -> &[String] {
        &self.resources_required
    }

    pub fn consequences(&self) -> &[String] {
        &self.consequences
    }
}

impl Aggregate for Capec {
    type Key = u32;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "capecs"
    }

    fn key(&self) -> u32 {
        self.capec_id
    }

    fn events(&self) -> &EventQueue<Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Event> {
        &mut self.events
    }
}

/// Field values for upserting a [`Capec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapecChanges {
    pub capec_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likelihood_of_attack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_flow: Option<Vec<AttackStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_required: Option<Vec<Skill>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consequences: Option<Vec<String>>,
}

impl CapecChanges {
    pub fn new(capec_id: u32) -> Self {
        Self {
            capec_id,
            ..Self::default()
        }
    }
}

impl Changeset<Capec> for CapecChanges {
    fn key(&self) -> u32 {
        self.capec_id
    }
}

impl Upsert for Capec {
    type Changes = CapecChanges;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cwe_changes_skip_unset_fields() {
        let changes = CweChanges {
            name: Some("Cross-site Scripting".to_string()),
            ..CweChanges::new(79)
        };
        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cwe_id": 79, "name": "Cross-site Scripting"})
        );
    }

    #[test]
    fn cwe_only_requires_identity_fields() {
        let cwe: Cwe = serde_json::from_value(serde_json::json!({
            "cwe_id": 79,
            "name": "Cross-site Scripting",
            "description": "Improper neutralization of input",
        }))
        .unwrap();

        assert_eq!(cwe.key(), 79);
        assert!(cwe.potential_mitigations().is_empty());
    }

    #[test]
    fn cve_requires_scoring() {
        let result: Result<Cve, _> = serde_json::from_value(serde_json::json!({
            "cve_id": "CVE-2024-23222",
            "description": "Type confusion in WebKit",
        }));
        assert!(result.is_err());
    }
}
