//! Daily review quota tracking.
//!
//! The counter kept here is an advisory pre-check for fast UX feedback;
//! the persistence collaborator re-validates every batch authoritatively
//! and may still reject a flush.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Account tier driving the daily cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTier {
    Free,
    Premium,
}

/// Quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaPolicy {
    /// Reviews per study day for the Free tier.
    pub free_reviews_per_day: u32,
    /// Hour of day (0-23) when a new study day begins. Reviews before this
    /// hour count toward the previous day, so late-night studying is not
    /// split across two days.
    pub daily_reset_hour: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            free_reviews_per_day: 200,
            daily_reset_hour: 0,
        }
    }
}

impl QuotaPolicy {
    /// Daily cap for a tier; None means effectively unlimited.
    pub fn cap(&self, tier: UserTier) -> Option<u32> {
        match tier {
            UserTier::Free => Some(self.free_reviews_per_day),
            UserTier::Premium => None,
        }
    }

    /// The study day `now` falls in, adjusted for the reset hour.
    pub fn adjusted_study_day(&self, now: DateTime<Utc>) -> NaiveDate {
        if now.hour() < self.daily_reset_hour {
            (now - Duration::days(1)).date_naive()
        } else {
            now.date_naive()
        }
    }
}

/// Local advisory counter for one user's study day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyQuota {
    day: NaiveDate,
    used: u32,
}

impl DailyQuota {
    pub fn new(now: DateTime<Utc>, policy: &QuotaPolicy) -> Self {
        Self {
            day: policy.adjusted_study_day(now),
            used: 0,
        }
    }

    /// Reviews already counted today, rolling the counter over when the
    /// study day has changed.
    pub fn used_today(&mut self, now: DateTime<Utc>, policy: &QuotaPolicy) -> u32 {
        let today = policy.adjusted_study_day(now);
        if today != self.day {
            self.day = today;
            self.used = 0;
        }
        self.used
    }

    /// Record completed reviews against today's allowance.
    pub fn record(&mut self, count: u32, now: DateTime<Utc>, policy: &QuotaPolicy) {
        self.used_today(now, policy);
        self.used = self.used.saturating_add(count);
    }

    /// Remaining allowance for the tier. Unlimited tiers report
    /// `u32::MAX`.
    pub fn remaining(&mut self, tier: UserTier, now: DateTime<Utc>, policy: &QuotaPolicy) -> u32 {
        let used = self.used_today(now, policy);
        match policy.cap(tier) {
            Some(cap) => cap.saturating_sub(used),
            None => u32::MAX,
        }
    }
}
