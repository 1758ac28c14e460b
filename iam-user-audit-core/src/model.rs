//! Audit data model: provider snapshots, findings and the aggregated result.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Rendered in place of a last-login date for users who never signed in.
pub const NEVER_LOGGED_IN: &str = "never";

/// IAM user as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamUser {
    /// IAM user name
    pub user_name: String,
    /// When the user was created
    pub create_date: DateTime<Utc>,
    /// Last console sign-in (`PasswordLastUsed`), absent if never used
    pub password_last_used: Option<DateTime<Utc>>,
}

/// Access key status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKeyStatus {
    /// Key can sign requests
    Active,
    /// Key is disabled (or reported with an unknown status)
    Inactive,
}

/// Access key metadata owned by a single user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    /// Owning user name
    pub user_name: String,
    /// Full access key id
    pub access_key_id: String,
    /// Key status
    pub status: AccessKeyStatus,
    /// When the key was created
    pub create_date: DateTime<Utc>,
}

impl AccessKey {
    /// Key id shortened for reports: first 8 characters followed by `...`.
    #[must_use]
    pub fn masked_id(&self) -> String {
        let prefix: String = self.access_key_id.chars().take(8).collect();
        format!("{prefix}...")
    }
}

/// Risk attached to a user without MFA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// The user can sign in to the console
    High,
    /// Programmatic-only user
    Medium,
}

impl RiskLevel {
    /// HIGH with console access, MEDIUM otherwise.
    #[must_use]
    pub const fn for_console_access(has_console: bool) -> Self {
        if has_console {
            Self::High
        } else {
            Self::Medium
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("HIGH"),
            Self::Medium => f.write_str("MEDIUM"),
        }
    }
}

/// Last console sign-in of an inactive user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastLogin {
    /// The user never signed in
    Never,
    /// Date of the last sign-in
    On(NaiveDate),
}

impl fmt::Display for LastLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str(NEVER_LOGGED_IN),
            Self::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for LastLogin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// User with no MFA device registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoMfaFinding {
    /// IAM user name
    pub username: String,
    /// Creation date of the user
    pub created: NaiveDate,
    /// Whether the user has a console password
    pub has_console: bool,
    /// HIGH iff `has_console`
    pub risk: RiskLevel,
}

/// Active access key older than the rotation threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleKeyFinding {
    /// Owning user name
    pub username: String,
    /// Masked key id, see [`AccessKey::masked_id`]
    pub key_id: String,
    /// Creation date of the key
    pub created: NaiveDate,
    /// Whole days since creation
    pub age_days: i64,
}

/// Console user that has not signed in recently (or ever)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InactiveConsoleFinding {
    /// IAM user name
    pub username: String,
    /// Last sign-in date or `never`
    pub last_login: LastLogin,
    /// Creation date of the user
    pub created: NaiveDate,
}

/// Outcome of one audit run.
///
/// The finding vectors follow user listing order and their lengths are the
/// counts reported everywhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditResult {
    /// Number of IAM users listed
    pub total_users: usize,
    /// Users without any MFA device
    pub users_without_mfa: Vec<NoMfaFinding>,
    /// Active access keys past the age threshold
    pub old_access_keys: Vec<StaleKeyFinding>,
    /// Console users past the inactivity threshold
    pub inactive_console_users: Vec<InactiveConsoleFinding>,
    /// Whether the root account has MFA
    pub root_mfa_enabled: bool,
}

impl AuditResult {
    /// Sum of the three per-user finding counts.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.users_without_mfa.len() + self.old_access_keys.len() + self.inactive_console_users.len()
    }
}
