//! Descriptor codec: records ⇄ JSON, records → human-readable text.
//!
//! Every function here is pure. JSON shapes:
//!
//! - companions: `[{"host", "udid", "port", "is_local"}, ...]`
//! - target: flat `{"name", "udid", "state", "type", "os_version", "architecture"}`
//!   plus `host`/`port`/`is_local` when a companion is bound
//! - installed app / test: `{"bundle_id", "name", "install_type", "architectures",
//!   "process_state", "debuggable"}` (test omits install type, process state, debuggable)
//! - test run: camelCase summary keys, snake_case activity keys, base64 attachment payloads
//!
//! Human-readable forms are for terminals and logs and are not meant to be re-parsed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::human_format_activities;
use crate::error::FormatError;
use crate::types::{
    AppProcessState, CompanionInfo, InstalledAppInfo, InstalledTestInfo, TargetDescription,
    TestRunInfo,
};

const NO_NAME: &str = "no bundle name available";
const NO_INSTALL_TYPE: &str = "no install type available";
const NO_ARCHITECTURES: &str = "no archs available";
const NO_COMPANION: &str = "No Companion Connected";
const FIELD_SEPARATOR: &str = " | ";
const LOG_INDENT: usize = 4;

// ---------------------------------------------------------------------------
// 1. Companions
// ---------------------------------------------------------------------------

/// Companion list as a JSON array value.
pub fn json_data_companions(companions: &[CompanionInfo]) -> Result<Value, FormatError> {
    serde_json::to_value(companions).map_err(FormatError::Encode)
}

/// Inverse of [`json_data_companions`]. Every entry must carry all four keys.
pub fn json_to_companion_info(data: Value) -> Result<Vec<CompanionInfo>, FormatError> {
    serde_json::from_value(data).map_err(FormatError::Decode)
}

/// Companion list as pretty-printed JSON text (the registry state-file format).
pub fn companions_to_json(companions: &[CompanionInfo]) -> Result<String, FormatError> {
    serde_json::to_string_pretty(companions).map_err(FormatError::Encode)
}

pub fn companions_from_json(data: &str) -> Result<Vec<CompanionInfo>, FormatError> {
    serde_json::from_str(data).map_err(FormatError::Decode)
}

/// Like [`companions_from_json`], but invalid UTF-8 is a decode error too.
pub fn companions_from_slice(data: &[u8]) -> Result<Vec<CompanionInfo>, FormatError> {
    serde_json::from_slice(data).map_err(FormatError::Decode)
}

// ---------------------------------------------------------------------------
// 2. Targets
// ---------------------------------------------------------------------------

/// Flat wire form of [`TargetDescription`]. The companion's udid is the
/// target's udid, so only host, port and locality are carried separately.
#[derive(Debug, Serialize, Deserialize)]
struct TargetRecord {
    name: String,
    udid: String,
    state: String,
    #[serde(rename = "type")]
    target_type: String,
    os_version: String,
    architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_local: Option<bool>,
}

impl From<&TargetDescription> for TargetRecord {
    fn from(target: &TargetDescription) -> Self {
        let companion = target.companion_info.as_ref();
        Self {
            name: target.name.clone(),
            udid: target.udid.clone(),
            state: target.state.clone(),
            target_type: target.target_type.clone(),
            os_version: target.os_version.clone(),
            architecture: target.architecture.clone(),
            host: companion.map(|c| c.host.clone()),
            port: companion.map(|c| c.port),
            is_local: companion.map(|c| c.is_local),
        }
    }
}

impl From<TargetRecord> for TargetDescription {
    fn from(record: TargetRecord) -> Self {
        // Partial companion data yields no companion at all.
        let companion_info = match (record.host, record.port, record.is_local) {
            (Some(host), Some(port), Some(is_local)) => Some(CompanionInfo {
                host,
                udid: record.udid.clone(),
                port,
                is_local,
            }),
            _ => None,
        };
        Self {
            name: record.name,
            udid: record.udid,
            state: record.state,
            target_type: record.target_type,
            os_version: record.os_version,
            architecture: record.architecture,
            companion_info,
            screen_dimensions: None,
        }
    }
}

/// `name | udid | state | type | os_version | architecture | host:port`
pub fn human_format_target_info(target: &TargetDescription) -> String {
    let companion = match &target.companion_info {
        Some(companion) => companion.address().to_string(),
        None => NO_COMPANION.to_string(),
    };
    [
        target.name.as_str(),
        target.udid.as_str(),
        target.state.as_str(),
        target.target_type.as_str(),
        target.os_version.as_str(),
        target.architecture.as_str(),
        companion.as_str(),
    ]
    .join(FIELD_SEPARATOR)
}

pub fn json_data_target_info(target: &TargetDescription) -> Result<Value, FormatError> {
    serde_json::to_value(TargetRecord::from(target)).map_err(FormatError::Encode)
}

pub fn json_format_target_info(target: &TargetDescription) -> Result<String, FormatError> {
    serde_json::to_string(&TargetRecord::from(target)).map_err(FormatError::Encode)
}

/// Requires `name`, `udid`, `state`, `type`, `os_version` and `architecture`.
pub fn target_description_from_dictionary(
    parsed: &Value,
) -> Result<TargetDescription, FormatError> {
    TargetRecord::deserialize(parsed)
        .map(TargetDescription::from)
        .map_err(FormatError::Decode)
}

pub fn target_description_from_json(data: &str) -> Result<TargetDescription, FormatError> {
    serde_json::from_str::<TargetRecord>(data)
        .map(TargetDescription::from)
        .map_err(FormatError::Decode)
}

// ---------------------------------------------------------------------------
// 3. Installed apps and tests
// ---------------------------------------------------------------------------

pub fn app_process_state_to_string(state: AppProcessState) -> &'static str {
    state.label()
}

/// Total: unrecognized input maps to [`AppProcessState::Unknown`].
pub fn app_process_string_to_state(output: &str) -> AppProcessState {
    AppProcessState::from_label(output)
}

fn join_architectures<'a>(architectures: Option<impl IntoIterator<Item = &'a String>>) -> String {
    let joined = architectures
        .map(|archs| archs.into_iter().map(String::as_str).collect::<Vec<_>>().join(", "))
        .unwrap_or_default();
    if joined.is_empty() {
        NO_ARCHITECTURES.to_string()
    } else {
        joined
    }
}

pub fn human_format_installed_app_info(app: &InstalledAppInfo) -> String {
    [
        app.bundle_id.as_str(),
        app.name.as_deref().unwrap_or(NO_NAME),
        app.install_type.as_deref().unwrap_or(NO_INSTALL_TYPE),
        join_architectures(app.architectures.as_ref()).as_str(),
        app_process_state_to_string(app.process_state),
        if app.debuggable {
            "Debuggable"
        } else {
            "Not Debuggable"
        },
    ]
    .join(FIELD_SEPARATOR)
}

pub fn json_format_installed_app_info(app: &InstalledAppInfo) -> Result<String, FormatError> {
    serde_json::to_string(app).map_err(FormatError::Encode)
}

pub fn installed_app_info_from_json(data: &str) -> Result<InstalledAppInfo, FormatError> {
    serde_json::from_str(data).map_err(FormatError::Decode)
}

pub fn human_format_installed_test_info(test: &InstalledTestInfo) -> String {
    [
        test.bundle_id.as_str(),
        test.name.as_deref().unwrap_or(NO_NAME),
        join_architectures(test.architectures.as_ref()).as_str(),
    ]
    .join(FIELD_SEPARATOR)
}

pub fn json_format_installed_test_info(test: &InstalledTestInfo) -> Result<String, FormatError> {
    serde_json::to_string(test).map_err(FormatError::Encode)
}

pub fn installed_test_info_from_json(data: &str) -> Result<InstalledTestInfo, FormatError> {
    serde_json::from_str(data).map_err(FormatError::Decode)
}

// ---------------------------------------------------------------------------
// 4. Test runs
// ---------------------------------------------------------------------------

/// Summary line, then an indented log block, then the activity tree.
pub fn human_format_test_info(test: &TestRunInfo) -> String {
    let mut info = vec![
        format!("{} - {}/{}", test.bundle_name, test.class_name, test.method_name),
        format!("Passed: {}", test.passed),
        format!("Crashed: {}", test.crashed),
        format!("Duration: {}", test.duration),
    ];
    if let Some(failure) = &test.failure_info {
        info.push(format!("Failure message: {}", failure.message));
        info.push(format!("Location {}:{}", failure.file, failure.line));
    }
    let mut output = info.join(FIELD_SEPARATOR);

    if !test.logs.is_empty() {
        let log_lines = indent(&test.logs.join("\n"), LOG_INDENT);
        output.push('\n');
        output.push_str(&indent(&format!("Logs:\n{log_lines}"), LOG_INDENT));
    }

    if let Some(activities) = test.activity_logs.as_deref().filter(|a| !a.is_empty()) {
        output.push('\n');
        output.push_str(&human_format_activities(activities));
    }
    output
}

pub fn json_format_test_info(test: &TestRunInfo) -> Result<String, FormatError> {
    serde_json::to_string(test).map_err(FormatError::Encode)
}

/// Inverse of [`json_format_test_info`]; attachment payloads are base64-decoded.
pub fn test_info_from_json(data: &str) -> Result<TestRunInfo, FormatError> {
    serde_json::from_str(data).map_err(FormatError::Decode)
}

/// Prefix every non-blank line of `text` with `width` spaces.
fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\n  \nb", 2), "  a\n\n  \n  b");
    }

    #[test]
    fn join_architectures_placeholder_for_none_and_empty() {
        assert_eq!(join_architectures(None::<Vec<&String>>), NO_ARCHITECTURES);
        assert_eq!(join_architectures(Some(Vec::<&String>::new())), NO_ARCHITECTURES);
    }

    #[test]
    fn partial_companion_fields_yield_no_companion() {
        let record = TargetRecord {
            name: "iPhone".into(),
            udid: "u1".into(),
            state: "Booted".into(),
            target_type: "simulator".into(),
            os_version: "iOS 17.0".into(),
            architecture: "arm64".into(),
            host: Some("localhost".into()),
            port: None,
            is_local: Some(true),
        };
        assert!(TargetDescription::from(record).companion_info.is_none());
    }
}
