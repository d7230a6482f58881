use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::TestBackend;
use crate::dto::test_dto::{AttemptDetailResponse, StudentStats};
use crate::error::{Error, Result};
use crate::models::test::Test;
use crate::models::test_attempt::{AnswerValue, AttemptStatus, TestAttempt};
use crate::models::test_result::TestResult;
use crate::models::violation::{Violation, ViolationKind};
use crate::services::autosave::{AutoSaveQueue, AUTOSAVE_DEBOUNCE};
use crate::services::results::ResultService;
use crate::services::violations::{ViolationLog, ViolationOutcome};
use crate::utils::time;

const TIME_UP_REASON: &str = "Time is up!";
const VIOLATION_REASON: &str = "Maximum violations exceeded";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Which screen the presentation layer should be showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Overview,
    Attempt,
    Result,
    ViewResult,
}

/// App lifecycle as reported by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

/// Notifications the UI must surface; produced by timer- and
/// violation-driven paths that have no caller to return to.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ViolationRecorded {
        kind: ViolationKind,
        count: u32,
        remaining: u32,
    },
    ForcedSubmission {
        reason: String,
    },
    TimeExpired,
    Submitted {
        result: TestResult,
    },
    SubmitFailed {
        message: String,
    },
}

struct Session {
    screen: Screen,
    test: Option<Test>,
    student_stats: Option<StudentStats>,
    can_start_attempt: bool,
    attempt: Option<TestAttempt>,
    answers: HashMap<i64, AnswerValue>,
    violations: ViolationLog,
    app_state: AppLifecycle,
    /// Seconds remaining; None for untimed tests. Never negative: zero is
    /// the terminal trigger, not a resting value.
    time_left: Option<u32>,
    result: Option<TestResult>,
}

impl Session {
    fn new() -> Self {
        Self {
            screen: Screen::Loading,
            test: None,
            student_stats: None,
            can_start_attempt: false,
            attempt: None,
            answers: HashMap::new(),
            violations: ViolationLog::new(),
            app_state: AppLifecycle::Active,
            time_left: None,
            result: None,
        }
    }

    fn attempt_in_progress(&self) -> Option<Uuid> {
        self.attempt
            .as_ref()
            .filter(|attempt| attempt.status == AttemptStatus::InProgress)
            .map(|attempt| attempt.id)
    }
}

struct ControllerInner<B> {
    backend: B,
    slug: String,
    session: Mutex<Session>,
    autosave: AutoSaveQueue,
    countdown: Mutex<Option<JoinHandle<()>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    is_submitting: AtomicBool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Owns one test-taking session: the screen state machine, the countdown,
/// the answer map with debounced auto-save, and violation escalation.
/// Dropping the controller (navigation away) cancels every timer it armed.
pub struct AttemptController<B: TestBackend> {
    inner: Arc<ControllerInner<B>>,
}

impl<B: TestBackend> AttemptController<B> {
    pub fn new(
        backend: B,
        slug: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ControllerInner {
            backend,
            slug: slug.into(),
            session: Mutex::new(Session::new()),
            autosave: AutoSaveQueue::new(),
            countdown: Mutex::new(None),
            heartbeat: Mutex::new(None),
            is_submitting: AtomicBool::new(false),
            events,
        });
        (Self { inner }, events_rx)
    }

    /// Fetch the test and pick the entry screen: resume an in-progress
    /// attempt, show the latest result when no further attempt is allowed,
    /// or land on the overview.
    pub async fn load(&self) -> Result<Screen> {
        let detail = self.inner.backend.fetch_test(&self.inner.slug).await?;

        let (resume_id, view_id) = {
            let mut session = self.inner.lock_session();

            let resume_id = detail
                .attempts
                .iter()
                .find(|attempt| attempt.status == AttemptStatus::InProgress)
                .map(|attempt| attempt.id);

            let view_id = if resume_id.is_none() && !detail.can_start_attempt {
                detail
                    .attempts
                    .iter()
                    .max_by_key(|attempt| attempt.attempt_number)
                    .filter(|attempt| {
                        matches!(
                            attempt.status,
                            AttemptStatus::Submitted | AttemptStatus::Graded
                        )
                    })
                    .map(|attempt| attempt.id)
            } else {
                None
            };

            session.test = Some(detail.test);
            session.student_stats = detail.student_stats;
            session.can_start_attempt = detail.can_start_attempt;
            if resume_id.is_none() && view_id.is_none() {
                session.screen = Screen::Overview;
            }
            (resume_id, view_id)
        };

        if let Some(attempt_id) = resume_id {
            info!(%attempt_id, "resuming in-progress attempt");
            self.resume_attempt(attempt_id).await?;
        } else if let Some(attempt_id) = view_id {
            self.view_attempt_result(attempt_id).await?;
        }

        Ok(self.screen())
    }

    /// Begin a fresh attempt. The availability precondition is checked
    /// before any network call; the server stays authoritative and its
    /// rejection surfaces as an API error.
    pub async fn start_test(&self) -> Result<()> {
        {
            let session = self.inner.lock_session();
            if session.screen == Screen::Attempt {
                return Err(Error::Precondition(
                    "an attempt is already in progress".to_string(),
                ));
            }
            if !session.can_start_attempt {
                return Err(Error::Precondition(
                    "no attempts remaining for this test".to_string(),
                ));
            }
        }

        let response = self.inner.backend.start_attempt(&self.inner.slug).await?;
        info!(attempt_id = %response.attempt.id, "attempt started");
        self.activate(response.attempt).await
    }

    /// Rejoin an in-progress attempt after an app restart: rehydrate the
    /// answer map from persisted submissions and recompute the remaining
    /// time from `started_at`.
    pub async fn resume_attempt(&self, attempt_id: Uuid) -> Result<()> {
        let response = self
            .inner
            .backend
            .fetch_attempt(&self.inner.slug, attempt_id)
            .await?;
        if response.attempt.status != AttemptStatus::InProgress {
            return Err(Error::Precondition(
                "attempt is not in progress".to_string(),
            ));
        }
        self.activate(response.attempt).await
    }

    async fn activate(&self, attempt: TestAttempt) -> Result<()> {
        let expired = ControllerInner::enter_attempt(&self.inner, attempt)?;
        if expired {
            let _ = self.inner.events.send(SessionEvent::TimeExpired);
            ControllerInner::submit(&self.inner, false, Some(TIME_UP_REASON)).await?;
        }
        Ok(())
    }

    /// Record the student's current response. The local map updates
    /// synchronously; persistence is debounced per item and skipped for
    /// empty values, closed attempts, and in-flight submissions.
    pub fn record_answer(&self, item_id: i64, value: AnswerValue) {
        let attempt_id = {
            let mut session = self.inner.lock_session();
            session.answers.insert(item_id, value.clone());

            if session.screen != Screen::Attempt || value.is_empty() {
                return;
            }
            match session.attempt_in_progress() {
                Some(id) => id,
                None => return,
            }
        };
        if self.inner.is_submitting.load(Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(AUTOSAVE_DEBOUNCE).await;
            inner.flush_answer(attempt_id, item_id, value).await;
        });
        self.inner.autosave.arm(item_id, handle);
    }

    /// Manual submission, triggered by the student.
    pub async fn submit(&self) -> Result<TestResult> {
        ControllerInner::submit(&self.inner, true, None).await
    }

    /// Confirmation message for a manual submit with unanswered items, or
    /// None when everything has a non-empty answer. The caller decides
    /// whether to proceed.
    pub fn check_incomplete_submit(&self) -> Option<String> {
        let session = self.inner.lock_session();
        if session.screen != Screen::Attempt {
            return None;
        }
        let test = session.test.as_ref()?;

        let unanswered = test
            .items
            .iter()
            .filter(|item| {
                session
                    .answers
                    .get(&item.id)
                    .map(|answer| answer.is_empty())
                    .unwrap_or(true)
            })
            .count();
        if unanswered == 0 {
            return None;
        }
        Some(format!(
            "You have {} unanswered question(s). Submit anyway?",
            unanswered
        ))
    }

    /// Show a past attempt read-only, recomputing the result from its
    /// persisted submissions.
    pub async fn view_attempt_result(&self, attempt_id: Uuid) -> Result<TestResult> {
        let response = self
            .inner
            .backend
            .fetch_attempt(&self.inner.slug, attempt_id)
            .await?;

        let mut attempt = response.attempt;
        let nested = attempt.test.take();

        let mut session = self.inner.lock_session();
        if let Some(test) = nested {
            session.test = Some(test);
        }
        let test = session
            .test
            .as_ref()
            .ok_or_else(|| Error::Internal("test definition missing".to_string()))?;
        let result = ResultService::materialize(&attempt, test);
        session.attempt = Some(attempt);
        session.result = Some(result.clone());
        session.screen = Screen::ViewResult;
        Ok(result)
    }

    pub fn back_to_overview(&self) {
        let mut session = self.inner.lock_session();
        if matches!(session.screen, Screen::Result | Screen::ViewResult) {
            session.screen = Screen::Overview;
        }
    }

    /// "Try again" from a result screen: refresh attempt availability
    /// (submission may have consumed the last allowed attempt), then chain
    /// into a fresh start.
    pub async fn try_again(&self) -> Result<()> {
        let detail = self.inner.backend.fetch_test(&self.inner.slug).await?;
        {
            let mut session = self.inner.lock_session();
            session.test = Some(detail.test);
            session.student_stats = detail.student_stats;
            session.can_start_attempt = detail.can_start_attempt;
            if matches!(session.screen, Screen::Result | Screen::ViewResult) {
                session.screen = Screen::Overview;
            }
        }
        self.start_test().await
    }

    /// Lifecycle input from the platform layer. A foreground → background
    /// transition during an attempt is a violation; the one that reaches
    /// the limit forces submission.
    pub async fn on_app_state_change(&self, next: AppLifecycle) {
        let recorded = {
            let mut session = self.inner.lock_session();
            let previous = std::mem::replace(&mut session.app_state, next);
            if session.screen != Screen::Attempt {
                return;
            }
            if previous != AppLifecycle::Active || next == AppLifecycle::Active {
                return;
            }
            let attempt_id = match session.attempt_in_progress() {
                Some(id) => id,
                None => return,
            };
            let (violation, outcome) = session
                .violations
                .record(ViolationKind::AppBackground, None);
            (attempt_id, violation, outcome)
        };
        let (attempt_id, violation, outcome) = recorded;

        ControllerInner::spawn_violation_report(&self.inner, attempt_id, violation.clone());

        match outcome {
            ViolationOutcome::Recorded { count, remaining } => {
                warn!(count, remaining, "app left the foreground during attempt");
                let _ = self.inner.events.send(SessionEvent::ViolationRecorded {
                    kind: violation.kind,
                    count,
                    remaining,
                });
            }
            ViolationOutcome::LimitReached { count } => {
                warn!(count, "violation limit reached, forcing submission");
                let _ = self.inner.events.send(SessionEvent::ViolationRecorded {
                    kind: violation.kind,
                    count,
                    remaining: 0,
                });
                let _ = self.inner.events.send(SessionEvent::ForcedSubmission {
                    reason: VIOLATION_REASON.to_string(),
                });
                if let Err(err) =
                    ControllerInner::submit(&self.inner, false, Some(VIOLATION_REASON)).await
                {
                    error!(error = %err, "forced submission failed");
                }
            }
        }
    }

    /// Cancel the countdown, heartbeat, and any pending auto-saves. Called
    /// on navigation away; also runs on drop.
    pub fn shutdown(&self) {
        self.inner.cancel_timers();
    }

    // Read-only observable state.

    pub fn screen(&self) -> Screen {
        self.inner.lock_session().screen
    }

    pub fn time_left(&self) -> Option<u32> {
        self.inner.lock_session().time_left
    }

    pub fn answers(&self) -> HashMap<i64, AnswerValue> {
        self.inner.lock_session().answers.clone()
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.inner.lock_session().violations.entries().to_vec()
    }

    pub fn is_force_submitted(&self) -> bool {
        self.inner.lock_session().violations.escalated()
    }

    pub fn result(&self) -> Option<TestResult> {
        self.inner.lock_session().result.clone()
    }

    pub fn test(&self) -> Option<Test> {
        self.inner.lock_session().test.clone()
    }

    pub fn attempt(&self) -> Option<TestAttempt> {
        self.inner.lock_session().attempt.clone()
    }

    pub fn student_stats(&self) -> Option<StudentStats> {
        self.inner.lock_session().student_stats.clone()
    }

    pub fn can_start_attempt(&self) -> bool {
        self.inner.lock_session().can_start_attempt
    }
}

impl<B: TestBackend> Drop for AttemptController<B> {
    fn drop(&mut self) {
        self.inner.cancel_timers();
    }
}

impl<B: TestBackend> ControllerInner<B> {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().expect("session mutex poisoned")
    }

    /// Move the session into the attempt screen and arm its timers.
    /// Returns true when the attempt is already out of time, in which case
    /// no timers are armed and the caller takes the time-up path.
    fn enter_attempt(this: &Arc<Self>, mut attempt: TestAttempt) -> Result<bool> {
        let time_left = {
            let mut session = this.lock_session();
            if let Some(test) = attempt.test.take() {
                session.test = Some(test);
            }
            let test = session
                .test
                .as_ref()
                .ok_or_else(|| Error::Internal("test definition missing".to_string()))?;

            let time_left = test
                .duration_minutes
                .map(|minutes| time::remaining_seconds(minutes, attempt.started_at, time::now()));

            session.answers = attempt
                .submissions
                .iter()
                .map(|submission| (submission.item_id, submission.answer.clone()))
                .collect();
            session.violations = ViolationLog::new();
            session.result = None;
            session.time_left = time_left;
            session.attempt = Some(attempt);
            session.screen = Screen::Attempt;
            time_left
        };

        let expired = time_left == Some(0);
        if !expired {
            if time_left.is_some() {
                Self::start_countdown(this);
            }
            Self::start_heartbeat(this);
        }
        Ok(expired)
    }

    /// One-second countdown; runs only while the session stays on the
    /// attempt screen. The tick that would cross zero clamps to zero and
    /// hands off to forced submission on a separate task, so aborting the
    /// countdown can never cancel the submit itself.
    fn start_countdown(this: &Arc<Self>) {
        let inner = Arc::clone(this);
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(Duration::from_secs(1));
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let expired = {
                    let mut session = inner.lock_session();
                    if session.screen != Screen::Attempt {
                        return;
                    }
                    match session.time_left {
                        Some(left) if left > 1 => {
                            session.time_left = Some(left - 1);
                            false
                        }
                        Some(_) => {
                            session.time_left = Some(0);
                            true
                        }
                        None => return,
                    }
                };
                if expired {
                    let _ = inner.events.send(SessionEvent::TimeExpired);
                    let forced = Arc::clone(&inner);
                    tokio::spawn(async move {
                        if let Err(err) =
                            ControllerInner::submit(&forced, false, Some(TIME_UP_REASON)).await
                        {
                            error!(error = %err, "time-up submission failed");
                        }
                    });
                    return;
                }
            }
        });

        let mut slot = this.countdown.lock().expect("countdown mutex poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Liveness ping so the server can tell an abandoned attempt from a
    /// live one. Best-effort.
    fn start_heartbeat(this: &Arc<Self>) {
        let inner = Arc::clone(this);
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let attempt_id = {
                    let session = inner.lock_session();
                    if session.screen != Screen::Attempt {
                        return;
                    }
                    match session.attempt_in_progress() {
                        Some(id) => id,
                        None => return,
                    }
                };
                if let Err(err) = inner.backend.heartbeat(&inner.slug, attempt_id).await {
                    debug!(error = %err, "heartbeat failed");
                }
            }
        });

        let mut slot = this.heartbeat.lock().expect("heartbeat mutex poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    fn stop_countdown(&self) {
        let mut slot = self.countdown.lock().expect("countdown mutex poisoned");
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    fn stop_heartbeat(&self) {
        let mut slot = self.heartbeat.lock().expect("heartbeat mutex poisoned");
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    fn cancel_timers(&self) {
        self.stop_countdown();
        self.stop_heartbeat();
        self.autosave.cancel_all();
    }

    /// Debounced auto-save landing. Re-checks that the attempt is still in
    /// progress at fire time; a server-side "not in progress" rejection is
    /// a benign race with submission.
    async fn flush_answer(&self, attempt_id: Uuid, item_id: i64, value: AnswerValue) {
        let still_in_progress = {
            let session = self.lock_session();
            session.screen == Screen::Attempt && session.attempt_in_progress() == Some(attempt_id)
        };
        if !still_in_progress {
            debug!(item_id, "skipping auto-save, attempt left in_progress");
            return;
        }

        match self
            .backend
            .save_answer(&self.slug, attempt_id, item_id, &value)
            .await
        {
            Ok(()) => debug!(item_id, "answer auto-saved"),
            Err(err) if err.is_attempt_closed() => {
                debug!(item_id, "auto-save raced with submission, ignoring");
            }
            Err(err) => warn!(item_id, error = %err, "auto-save failed"),
        }
    }

    fn spawn_violation_report(this: &Arc<Self>, attempt_id: Uuid, violation: Violation) {
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            if let Err(err) = inner
                .backend
                .report_violation(&inner.slug, attempt_id, &violation)
                .await
            {
                debug!(error = %err, "violation report failed");
            }
        });
    }

    /// The single submission path, shared by manual submits, the time-up
    /// trigger, and violation escalation. The `is_submitting` swap happens
    /// before the first await, so two callers can never both reach the
    /// network; pending auto-saves are cancelled before the request goes
    /// out so no stale write can land after the attempt closes.
    async fn submit(this: &Arc<Self>, manual: bool, reason: Option<&str>) -> Result<TestResult> {
        if this.is_submitting.swap(true, Ordering::SeqCst) {
            debug!(manual, "submission already in flight");
            return Err(Error::SubmitInFlight);
        }

        this.autosave.cancel_all();
        this.stop_heartbeat();

        let attempt_id = this.lock_session().attempt_in_progress();
        let Some(attempt_id) = attempt_id else {
            this.is_submitting.store(false, Ordering::SeqCst);
            return Err(Error::Precondition("no attempt in progress".to_string()));
        };

        match reason {
            Some(reason) => info!(%attempt_id, %reason, "submitting attempt"),
            None => info!(%attempt_id, "submitting attempt"),
        }

        let outcome = this.backend.submit_attempt(&this.slug, attempt_id).await;
        let outcome = match outcome {
            Ok(response) => this.adopt_submission(response),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(result) => {
                this.stop_countdown();
                this.is_submitting.store(false, Ordering::SeqCst);
                let _ = this.events.send(SessionEvent::Submitted {
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                this.is_submitting.store(false, Ordering::SeqCst);
                error!(error = %err, manual, "attempt submission failed");
                let _ = this.events.send(SessionEvent::SubmitFailed {
                    message: err.to_string(),
                });
                // Still on the attempt screen: the countdown kept running,
                // but the heartbeat was stopped above and must come back.
                let still_in_attempt = this.lock_session().screen == Screen::Attempt;
                if still_in_attempt {
                    Self::start_heartbeat(this);
                }
                Err(err)
            }
        }
    }

    fn adopt_submission(&self, response: AttemptDetailResponse) -> Result<TestResult> {
        let mut session = self.lock_session();
        let mut attempt = response.attempt;
        if let Some(test) = attempt.test.take() {
            session.test = Some(test);
        }
        let test = session
            .test
            .as_ref()
            .ok_or_else(|| Error::Internal("test definition missing".to_string()))?;

        let result = ResultService::materialize(&attempt, test);
        session.attempt = Some(attempt);
        session.result = Some(result.clone());
        session.screen = Screen::Result;
        Ok(result)
    }
}
