use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn from_rfc3339(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Seconds left on a timed attempt: `duration*60 - elapsed`, floored at
/// zero. Elapsed time truncates to whole seconds.
pub fn remaining_seconds(
    duration_minutes: u32,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u32 {
    let elapsed = (now - started_at).num_seconds().max(0);
    (duration_minutes as i64 * 60 - elapsed).max(0) as u32
}
