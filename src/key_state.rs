// src/key_state.rs

use crate::error::{FailureClass, UpstreamFailure};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Snapshot of the most recent failure seen on a key.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub message: String,
    pub status_code: Option<u16>,
    pub timestamp: DateTime<Utc>,
}

/// How long a key sits out after a disqualifying failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownPolicy {
    pub quota_exhausted: Duration,
    pub rate_limited: Duration,
    pub unauthorized: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            quota_exhausted: Duration::minutes(60),
            rate_limited: Duration::minutes(15),
            unauthorized: Duration::hours(24),
        }
    }
}

impl CooldownPolicy {
    /// `None` means the failure is recorded but the key stays in rotation.
    pub fn cooldown_for(&self, class: FailureClass) -> Option<Duration> {
        match class {
            FailureClass::QuotaExhausted => Some(self.quota_exhausted),
            FailureClass::RateLimited => Some(self.rate_limited),
            FailureClass::Unauthorized => Some(self.unauthorized),
            FailureClass::Other => None,
        }
    }
}

/// Health record of a single API key.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyHealth {
    pub is_active: bool,
    pub error_count: u32,
    pub last_error: Option<LastError>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl Default for KeyHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHealth {
    pub fn new() -> Self {
        Self {
            is_active: true,
            error_count: 0,
            last_error: None,
            cooldown_until: None,
        }
    }

    /// Whether the key may be used at `now`.
    ///
    /// An elapsed cooldown is cleared here: the key is reactivated and its
    /// error count reset. There is no timer doing this in the background.
    pub fn is_available(&mut self, now: DateTime<Utc>) -> bool {
        match self.cooldown_until {
            Some(until) if now < until => return false,
            Some(_) => {
                self.is_active = true;
                self.cooldown_until = None;
                self.error_count = 0;
            }
            None => {}
        }
        self.is_active
    }

    /// Records a failed attempt and applies the cooldown policy.
    /// Returns the cooldown that was started, if any.
    pub fn record_failure(
        &mut self,
        failure: &UpstreamFailure,
        now: DateTime<Utc>,
        policy: &CooldownPolicy,
    ) -> Option<Duration> {
        self.error_count += 1;
        self.last_error = Some(LastError {
            message: failure.message.clone(),
            status_code: failure.status.map(|s| s.as_u16()),
            timestamp: now,
        });

        let cooldown = policy.cooldown_for(failure.class())?;
        self.is_active = false;
        self.cooldown_until = Some(now + cooldown);
        Some(cooldown)
    }

    /// Clears the failure streak. Activation and cooldown are left alone.
    pub fn record_success(&mut self) {
        self.error_count = 0;
        self.last_error = None;
    }
}
