use crate::models::violation::{Violation, ViolationKind};

/// Violations observed before the attempt is force-submitted.
pub const MAX_VIOLATIONS: u32 = 3;

/// Append-only record of anti-cheat events for one attempt session. The
/// `escalated` latch guarantees the limit triggers forced submission exactly
/// once, even if more violations arrive while the submission is in flight.
#[derive(Debug, Default)]
pub struct ViolationLog {
    entries: Vec<Violation>,
    escalated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    Recorded { count: u32, remaining: u32 },
    LimitReached { count: u32 },
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        kind: ViolationKind,
        details: Option<String>,
    ) -> (Violation, ViolationOutcome) {
        let violation = Violation::new(kind, details);
        self.entries.push(violation.clone());

        let count = self.entries.len() as u32;
        let outcome = if count >= MAX_VIOLATIONS && !self.escalated {
            self.escalated = true;
            ViolationOutcome::LimitReached { count }
        } else {
            ViolationOutcome::Recorded {
                count,
                remaining: MAX_VIOLATIONS.saturating_sub(count),
            }
        };
        (violation, outcome)
    }

    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn escalated(&self) -> bool {
        self.escalated
    }

    pub fn entries(&self) -> &[Violation] {
        &self.entries
    }
}
