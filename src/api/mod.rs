pub mod client;

use std::future::Future;

use uuid::Uuid;

use crate::dto::test_dto::{AttemptDetailResponse, TestDetailResponse};
use crate::error::Result;
use crate::models::test_attempt::AnswerValue;
use crate::models::violation::Violation;

/// The REST boundary the attempt engine drives. `ApiClient` is the real
/// implementation; tests substitute a scripted one. Returned futures are
/// `Send` because auto-save, heartbeat, and violation reports run on
/// spawned tasks.
pub trait TestBackend: Send + Sync + 'static {
    fn fetch_test(&self, slug: &str) -> impl Future<Output = Result<TestDetailResponse>> + Send;

    fn fetch_attempt(
        &self,
        slug: &str,
        attempt_id: Uuid,
    ) -> impl Future<Output = Result<AttemptDetailResponse>> + Send;

    fn start_attempt(&self, slug: &str)
        -> impl Future<Output = Result<AttemptDetailResponse>> + Send;

    fn save_answer(
        &self,
        slug: &str,
        attempt_id: Uuid,
        item_id: i64,
        answer: &AnswerValue,
    ) -> impl Future<Output = Result<()>> + Send;

    fn submit_attempt(
        &self,
        slug: &str,
        attempt_id: Uuid,
    ) -> impl Future<Output = Result<AttemptDetailResponse>> + Send;

    fn report_violation(
        &self,
        slug: &str,
        attempt_id: Uuid,
        violation: &Violation,
    ) -> impl Future<Output = Result<()>> + Send;

    fn heartbeat(
        &self,
        slug: &str,
        attempt_id: Uuid,
    ) -> impl Future<Output = Result<()>> + Send;
}
