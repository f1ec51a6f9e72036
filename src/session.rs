use crate::clock::{Millis, Timestamp};
use serde::{Deserialize, Serialize};

/// A lap (split) recorded against a stopwatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub id: String,
    /// Elapsed time of the stopwatch when the lap was taken
    pub total_time: Millis,
    /// `total_time` minus the previous lap's `total_time`
    pub lap_time: Millis,
    pub label: String,
}

impl Lap {
    pub fn new(total_time: Millis, lap_time: Millis, label: String) -> Self {
        Self {
            id: new_id(),
            total_time,
            lap_time,
            label,
        }
    }
}

/// A finished stopwatch run, ready to be archived.
///
/// The archive assigns `id` and `timestamp` when it stores one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub total_time: Millis,
    pub laps: Vec<Lap>,
    pub label: String,
}

/// An archived run. Never mutated after creation, except for lap removal
/// through the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// When the session was archived
    pub timestamp: Timestamp,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub total_time: Millis,
    pub laps: Vec<Lap>,
    pub label: String,
}

impl Session {
    pub fn from_new(new: NewSession, timestamp: Timestamp) -> Self {
        Self {
            id: new_id(),
            timestamp,
            start_time: new.start_time,
            end_time: new.end_time,
            total_time: new.total_time,
            laps: new.laps,
            label: new.label,
        }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
