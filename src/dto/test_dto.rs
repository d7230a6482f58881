use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::test::Test;
use crate::models::test_attempt::{AnswerValue, TestAttempt};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDetailResponse {
    pub test: Test,
    #[serde(default)]
    pub student_stats: Option<StudentStats>,
    pub can_start_attempt: bool,
    /// The student's attempts for this test, as summaries (no submissions).
    #[serde(default)]
    pub attempts: Vec<TestAttempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentStats {
    pub attempts_used: i32,
    #[serde(default)]
    pub best_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDetailResponse {
    pub attempt: TestAttempt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub item_id: i64,
    pub answer: AnswerValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub saved: bool,
    pub item_id: i64,
    pub timestamp: DateTime<Utc>,
}
