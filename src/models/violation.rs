use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Violation {
    pub fn new(kind: ViolationKind, details: Option<String>) -> Self {
        Self {
            kind,
            occurred_at: time::now(),
            details,
        }
    }
}

/// Only `AppBackground` is produced today; the remaining kinds are part of
/// the wire contract and reserved for other detection sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    AppBackground,
    TabSwitch,
    CopyPaste,
    Screenshot,
    ScreenRecord,
}

impl ViolationKind {
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::AppBackground => "app left the foreground",
            ViolationKind::TabSwitch => "tab switch",
            ViolationKind::CopyPaste => "copy/paste",
            ViolationKind::Screenshot => "screenshot",
            ViolationKind::ScreenRecord => "screen recording",
        }
    }
}
