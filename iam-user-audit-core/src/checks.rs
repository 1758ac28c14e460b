//! Per-user security checks.
//!
//! Everything here is a pure function of provider data and a fixed clock, so
//! the engine decides *what* to fetch and these functions decide *what is a
//! finding*.

use chrono::{DateTime, Duration, Utc};
use derive_new::new;

use crate::errors::{AuditError, Result};
use crate::model::{
    AccessKey, AccessKeyStatus, IamUser, InactiveConsoleFinding, LastLogin, NoMfaFinding,
    RiskLevel, StaleKeyFinding,
};

/// Default age, in days, past which keys are stale and console users inactive.
pub const DEFAULT_THRESHOLD_DAYS: i64 = 90;

/// Largest accepted threshold, roughly a century.
pub const MAX_THRESHOLD_DAYS: i64 = 36_500;

/// Audit thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct AuditConfig {
    /// Active access keys created more than this many days ago are stale
    pub max_key_age_days: i64,
    /// Console users without a sign-in for this many days are inactive
    pub max_inactive_days: i64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_DAYS, DEFAULT_THRESHOLD_DAYS)
    }
}

/// Thresholds resolved against one clock reading, shared by every check of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckWindow {
    /// Reference instant of the run
    pub now: DateTime<Utc>,
    /// Keys created strictly before this instant are stale
    pub key_created_before: DateTime<Utc>,
    /// Console sign-ins strictly before this instant are inactive
    pub login_before: DateTime<Utc>,
}

impl CheckWindow {
    /// Resolve `config` against `now`.
    ///
    /// Fails when a threshold does not fit in the representable date range.
    pub fn new(config: &AuditConfig, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            now,
            key_created_before: days_before(now, "max_key_age_days", config.max_key_age_days)?,
            login_before: days_before(now, "max_inactive_days", config.max_inactive_days)?,
        })
    }

    /// Whole days elapsed between `since` and the reference instant.
    #[must_use]
    pub fn age_in_days(&self, since: DateTime<Utc>) -> i64 {
        (self.now - since).num_days()
    }
}

fn days_before(now: DateTime<Utc>, setting: &'static str, days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or(AuditError::InvalidThreshold { setting, days })
}

/// Flag a user that has no MFA device.
#[must_use]
pub fn check_user_mfa(user: &IamUser, has_console: bool, mfa_devices: usize) -> Option<NoMfaFinding> {
    (mfa_devices == 0).then(|| NoMfaFinding {
        username: user.user_name.clone(),
        created: user.create_date.date_naive(),
        has_console,
        risk: RiskLevel::for_console_access(has_console),
    })
}

/// Flag every active key created before the window's key threshold.
#[must_use]
pub fn check_access_keys(keys: &[AccessKey], window: &CheckWindow) -> Vec<StaleKeyFinding> {
    keys.iter()
        .filter(|key| key.status == AccessKeyStatus::Active)
        .filter(|key| key.create_date < window.key_created_before)
        .map(|key| StaleKeyFinding {
            username: key.user_name.clone(),
            key_id: key.masked_id(),
            created: key.create_date.date_naive(),
            age_days: window.age_in_days(key.create_date),
        })
        .collect()
}

/// Flag a console user who never signed in or last signed in before the threshold.
///
/// Users without console access are never flagged.
#[must_use]
pub fn check_console_activity(
    user: &IamUser,
    has_console: bool,
    window: &CheckWindow,
) -> Option<InactiveConsoleFinding> {
    if !has_console {
        return None;
    }

    let last_login = match user.password_last_used {
        None => LastLogin::Never,
        Some(last) if last < window.login_before => LastLogin::On(last.date_naive()),
        Some(_) => return None,
    };

    Some(InactiveConsoleFinding {
        username: user.user_name.clone(),
        last_login,
        created: user.create_date.date_naive(),
    })
}
