use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::test::Test;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAttempt {
    pub id: Uuid,
    /// 1-based, per student per test.
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    /// None until the backend finishes grading.
    pub total_score: Option<f64>,
    #[serde(default)]
    pub violations_count: i32,
    #[serde(default)]
    pub submissions: Vec<ItemSubmission>,
    /// Present in detail responses, absent in summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Test>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSubmission {
    pub item_id: i64,
    pub answer: AnswerValue,
    /// None while the item awaits manual grading.
    pub score: Option<f64>,
}

/// A student's response to one item. The wire shape depends on the item
/// type, so this stays an untagged union: bools for boolean items, option
/// indexes for multiple choice, free text for fill-blank/essay, and a
/// structured payload for coding submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Choice(u32),
    Text(String),
    Structured(JsonValue),
}

impl AnswerValue {
    /// Blank text and JSON null do not count as an answer.
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Structured(value) => value.is_null(),
            AnswerValue::Bool(_) | AnswerValue::Choice(_) => false,
        }
    }
}
