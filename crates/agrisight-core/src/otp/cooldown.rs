//! Resend cooldown derived from the issue instant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Window during which resending a code is blocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    /// Instant the current code was sent.
    pub started_at: DateTime<Utc>,
    /// Length of the window in whole seconds.
    pub seconds: u32,
}

impl Cooldown {
    /// Cooldown of `seconds` starting at `started_at`.
    #[must_use]
    pub const fn new(started_at: DateTime<Utc>, seconds: u32) -> Self {
        Self {
            started_at,
            seconds,
        }
    }

    /// Instant the window closes.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(i64::from(self.seconds))
    }

    /// Whole seconds left, rounded up, never negative.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let left = (self.ends_at() - now).num_milliseconds();
        if left <= 0 {
            0
        } else {
            u64::try_from(left).map_or(u64::MAX, |ms| ms.div_ceil(1_000))
        }
    }

    /// Whether a resend is allowed at `now`.
    #[must_use]
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) == 0
    }
}

/// Render seconds as `m:ss` for the resend countdown.
#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
