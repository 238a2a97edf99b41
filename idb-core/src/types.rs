//! Domain types shared by the codec and the companion registry.
//!
//! Value objects only: equality is structural and nothing here performs I/O.
//! Types whose JSON shape matches their field layout derive serde directly;
//! [`TargetDescription`] goes through a flat wire record in [`crate::format`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Companions
// ---------------------------------------------------------------------------

/// A remote device-bridge endpoint.
///
/// Field order is the on-disk key order: `host, udid, port, is_local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanionInfo {
    pub host: String,
    pub udid: String,
    pub port: u16,
    pub is_local: bool,
}

impl CompanionInfo {
    pub fn address(&self) -> Address {
        Address {
            host: self.host.clone(),
            port: self.port,
        }
    }

    /// True when this companion listens on `address`.
    pub fn matches_address(&self, address: &Address) -> bool {
        self.host == address.host && self.port == address.port
    }
}

/// Lookup key for a companion whose udid is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenDimensions {
    pub width: u64,
    pub height: u64,
    pub density: Option<f64>,
    pub width_points: u64,
    pub height_points: u64,
}

/// A discoverable device or simulator.
///
/// `companion_info` is only set while a companion is bound to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDescription {
    pub name: String,
    pub udid: String,
    pub state: String,
    pub target_type: String,
    pub os_version: String,
    pub architecture: String,
    pub companion_info: Option<CompanionInfo>,
    pub screen_dimensions: Option<ScreenDimensions>,
}

// ---------------------------------------------------------------------------
// Installed apps and tests
// ---------------------------------------------------------------------------

/// Run state of an installed app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AppProcessState {
    Running,
    NotRunning,
    #[default]
    Unknown,
}

/// Every state with a dedicated label. Anything not listed maps to
/// [`AppProcessState::Unknown`] in both directions.
const PROCESS_STATE_LABELS: [(AppProcessState, &str); 2] = [
    (AppProcessState::Running, "Running"),
    (AppProcessState::NotRunning, "Not running"),
];

const UNKNOWN_PROCESS_STATE_LABEL: &str = "Unknown";

impl AppProcessState {
    pub fn label(self) -> &'static str {
        PROCESS_STATE_LABELS
            .iter()
            .find(|(state, _)| *state == self)
            .map(|(_, label)| *label)
            .unwrap_or(UNKNOWN_PROCESS_STATE_LABEL)
    }

    /// Never fails: unrecognized labels decode to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        PROCESS_STATE_LABELS
            .iter()
            .find(|(_, known)| *known == label)
            .map(|(state, _)| *state)
            .unwrap_or(AppProcessState::Unknown)
    }
}

impl fmt::Display for AppProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for AppProcessState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AppProcessState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .as_deref()
            .map(AppProcessState::from_label)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledAppInfo {
    pub bundle_id: String,
    pub name: Option<String>,
    pub install_type: Option<String>,
    #[serde(serialize_with = "architectures_or_null")]
    pub architectures: Option<BTreeSet<String>>,
    #[serde(default)]
    pub process_state: AppProcessState,
    pub debuggable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledTestInfo {
    pub bundle_id: String,
    pub name: Option<String>,
    #[serde(serialize_with = "architectures_or_null")]
    pub architectures: Option<BTreeSet<String>>,
}

// ---------------------------------------------------------------------------
// Test runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunFailureInfo {
    pub message: String,
    pub file: String,
    pub line: u64,
}

/// Result of a single test method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunInfo {
    pub bundle_name: String,
    pub class_name: String,
    pub method_name: String,
    pub logs: Vec<String>,
    /// Seconds.
    pub duration: f64,
    pub passed: bool,
    pub crashed: bool,
    pub failure_info: Option<TestRunFailureInfo>,
    #[serde(serialize_with = "activity_logs_or_empty")]
    pub activity_logs: Option<Vec<TestActivity>>,
}

/// A timed unit of work inside a test run.
///
/// Children are owned by their parent, so a trace is always a finite tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestActivity {
    pub title: String,
    pub duration: f64,
    pub uuid: String,
    pub activity_type: String,
    pub start: f64,
    pub finish: f64,
    pub name: String,
    #[serde(default)]
    pub attachments: Vec<TestAttachment>,
    #[serde(default)]
    pub sub_activities: Vec<TestActivity>,
}

/// A named binary artifact captured during an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAttachment {
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    #[serde(rename = "timestap", alias = "timestamp")]
    pub timestamp: f64,
    pub name: String,
    pub uniform_type_identifier: String,
}

/// An empty set carries no information and is written as `null`.
fn architectures_or_null<S: Serializer>(
    architectures: &Option<BTreeSet<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    architectures
        .as_ref()
        .filter(|archs| !archs.is_empty())
        .serialize(serializer)
}

fn activity_logs_or_empty<S: Serializer>(
    activities: &Option<Vec<TestActivity>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    activities.as_deref().unwrap_or_default().serialize(serializer)
}

mod base64_payload {
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| de::Error::custom(format!("invalid base64 attachment payload: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
