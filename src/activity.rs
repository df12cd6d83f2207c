//! Activity log primitives: the event record emitted by the proctoring
//! instrumentation and the `HH:MM:SS` timestamp parser shared by both scorers.

use serde::{Deserialize, Serialize};

/// Timestamp sentinel written by the recorder when the video offset is unknown.
pub const UNKNOWN_TIMESTAMP: &str = "NaN:NaN:NaN";

fn default_kind() -> String {
    "Extension Proctoring".to_string()
}
fn default_timestamp() -> String {
    "00:00:00".to_string()
}
fn default_description() -> String {
    "Unknown".to_string()
}
fn default_count() -> u32 {
    1
}

/// One logged occurrence, e.g. `{"activityDescription": "Tab change detected", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(
        rename = "timeStampInVideo",
        alias = "timestampInVideo",
        default = "default_timestamp"
    )]
    pub timestamp: String,
    #[serde(rename = "activityDescription", default = "default_description")]
    pub description: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

impl ActivityEvent {
    pub fn new(description: impl Into<String>, timestamp: impl Into<String>, count: u32) -> Self {
        Self {
            kind: default_kind(),
            timestamp: timestamp.into(),
            description: description.into(),
            count,
        }
    }

    /// Elapsed seconds since the start of the recording, if the timestamp is usable.
    pub fn seconds(&self) -> Option<u32> {
        parse_hms(&self.timestamp)
    }
}

/// On-disk shape of a candidate log file: `{"activityLog": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLogFile {
    #[serde(rename = "activityLog", default)]
    pub activity_log: Vec<ActivityEvent>,
}

/// Parse `HH:MM:SS` into seconds.
///
/// Returns `None` for the `NaN` sentinel (in any component), for anything that is
/// not exactly three non-negative integer fields, and on overflow.
pub fn parse_hms(ts: &str) -> Option<u32> {
    if ts.contains("NaN") {
        return None;
    }
    let mut parts = ts.split(':');
    let h: u32 = parts.next()?.trim().parse().ok()?;
    let m: u32 = parts.next()?.trim().parse().ok()?;
    let s: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?.checked_add(s)
}
