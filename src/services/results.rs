use crate::models::test::Test;
use crate::models::test_attempt::TestAttempt;
use crate::models::test_result::TestResult;

/// Percentage at or above which an attempt counts as passed.
pub const PASS_THRESHOLD_PERCENT: f64 = 50.0;

pub struct ResultService;

impl ResultService {
    /// Derive the displayable result for an attempt. Pure: fresh submit
    /// responses and historical fetches go through this same computation.
    pub fn materialize(attempt: &TestAttempt, test: &Test) -> TestResult {
        let total_points = f64::from(test.total_points.max(0));
        let score = attempt.total_score.unwrap_or_else(|| {
            attempt
                .submissions
                .iter()
                .filter_map(|submission| submission.score)
                .sum()
        });

        let percentage = if total_points > 0.0 {
            (score / total_points) * 100.0
        } else {
            0.0
        };

        let graded_items = attempt
            .submissions
            .iter()
            .filter(|submission| submission.score.is_some())
            .count();
        let total_items = test.items.len();

        TestResult {
            score,
            total_points,
            percentage,
            passed: percentage >= PASS_THRESHOLD_PERCENT,
            graded_items,
            total_items,
            needs_manual_grading: graded_items < total_items,
            violations_count: attempt.violations_count,
        }
    }
}
