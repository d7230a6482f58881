use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    /// None means the test is untimed.
    pub duration_minutes: Option<u32>,
    pub total_points: i32,
    /// 0 means unlimited attempts.
    pub max_attempts: i32,
    pub status: TestStatus,
    #[serde(default)]
    pub items: Vec<TestItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Draft,
    Scheduled,
    Active,
    Closed,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestItem {
    pub id: i64,
    pub position: i32,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(flatten)]
    pub payload: ItemPayload,
}

fn default_points() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemPayload {
    MultipleChoice {
        question: String,
        options: Vec<String>,
    },
    FillBlank {
        question: String,
    },
    Boolean {
        question: String,
    },
    CodingChallenge {
        title: String,
        prompt: String,
        language: String,
        starter_code: Option<String>,
    },
    Essay {
        prompt: String,
        min_words: Option<u32>,
    },
}

impl ItemPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ItemPayload::MultipleChoice { .. } => "multiple_choice",
            ItemPayload::FillBlank { .. } => "fill_blank",
            ItemPayload::Boolean { .. } => "boolean",
            ItemPayload::CodingChallenge { .. } => "coding_challenge",
            ItemPayload::Essay { .. } => "essay",
        }
    }

    /// Short text shown when listing items, whatever the variant.
    pub fn prompt(&self) -> &str {
        match self {
            ItemPayload::MultipleChoice { question, .. } => question,
            ItemPayload::FillBlank { question } => question,
            ItemPayload::Boolean { question } => question,
            ItemPayload::CodingChallenge { prompt, .. } => prompt,
            ItemPayload::Essay { prompt, .. } => prompt,
        }
    }
}
