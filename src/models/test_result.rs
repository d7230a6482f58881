use serde::{Deserialize, Serialize};

/// Derived from an attempt plus its test definition, never stored. Both the
/// fresh-submission path and the historical view recompute it through
/// `ResultService::materialize`, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub score: f64,
    pub total_points: f64,
    pub percentage: f64,
    pub passed: bool,
    pub graded_items: usize,
    pub total_items: usize,
    pub needs_manual_grading: bool,
    /// The server-persisted count of record, not the client session's list.
    pub violations_count: i32,
}
