//! Audit engine: drives the identity provider and assembles an [`AuditResult`].

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::aws::IdentityProvider;
use crate::checks::{
    check_access_keys, check_console_activity, check_user_mfa, AuditConfig, CheckWindow,
};
use crate::errors::Result;
use crate::model::{AuditResult, IamUser, InactiveConsoleFinding, NoMfaFinding, StaleKeyFinding};

/// Runs the MFA, access key, console inactivity and root MFA checks.
///
/// Failures of account-wide calls abort the run. Failures of per-user MFA or
/// access key lookups are logged and the user is evaluated as if the
/// lookup had returned nothing: no MFA device, no active key.
pub struct AuditEngine<'a, P: IdentityProvider + ?Sized> {
    provider: &'a P,
    config: AuditConfig,
}

impl<'a, P: IdentityProvider + ?Sized> AuditEngine<'a, P> {
    /// New engine over `provider`
    pub const fn new(provider: &'a P, config: AuditConfig) -> Self {
        Self { provider, config }
    }

    /// Run every check against the current time.
    pub async fn run_all_checks(&self) -> Result<AuditResult> {
        self.run_all_checks_at(Utc::now()).await
    }

    /// Run every check with `now` as the reference instant for age thresholds.
    pub async fn run_all_checks_at(&self, now: DateTime<Utc>) -> Result<AuditResult> {
        let window = CheckWindow::new(&self.config, now)?;
        debug!(
            "Audit window: keys created before {}, logins before {}",
            window.key_created_before, window.login_before
        );
        info!("Running checks...");

        let users = self.provider.list_all_users().await?;
        info!("Users found: {}", users.len());

        let users_without_mfa = self.check_mfa(&users).await?;
        info!("Users without MFA: {}", users_without_mfa.len());

        let old_access_keys = self.check_old_access_keys(&users, &window).await;
        info!(
            "Access keys older than {} days: {}",
            self.config.max_key_age_days,
            old_access_keys.len()
        );

        let inactive_console_users = self.check_inactive_console_users(&users, &window).await?;
        info!(
            "Console users inactive for more than {} days: {}",
            self.config.max_inactive_days,
            inactive_console_users.len()
        );

        let root_mfa_enabled = self.provider.is_root_mfa_enabled().await?;
        if root_mfa_enabled {
            info!("Root account MFA: enabled");
        } else {
            warn!("Root account MFA: NOT ENABLED (critical)");
        }

        Ok(AuditResult {
            total_users: users.len(),
            users_without_mfa,
            old_access_keys,
            inactive_console_users,
            root_mfa_enabled,
        })
    }

    async fn check_mfa(&self, users: &[IamUser]) -> Result<Vec<NoMfaFinding>> {
        let mut findings = Vec::new();

        for user in users {
            let has_console = self.provider.has_console_access(&user.user_name).await?;

            let mfa_devices = match self.provider.mfa_device_count(&user.user_name).await {
                Ok(count) => count,
                Err(e) => {
                    warn!("Error checking MFA for {}: {}", user.user_name, e);
                    0
                }
            };

            findings.extend(check_user_mfa(user, has_console, mfa_devices));
        }

        Ok(findings)
    }

    async fn check_old_access_keys(
        &self,
        users: &[IamUser],
        window: &CheckWindow,
    ) -> Vec<StaleKeyFinding> {
        let mut findings = Vec::new();

        for user in users {
            match self.provider.list_active_access_keys(&user.user_name).await {
                Ok(keys) => findings.extend(check_access_keys(&keys, window)),
                Err(e) => warn!("Error checking access keys for {}: {}", user.user_name, e),
            }
        }

        findings
    }

    async fn check_inactive_console_users(
        &self,
        users: &[IamUser],
        window: &CheckWindow,
    ) -> Result<Vec<InactiveConsoleFinding>> {
        let mut findings = Vec::new();

        for user in users {
            let has_console = self.provider.has_console_access(&user.user_name).await?;
            findings.extend(check_console_activity(user, has_console, window));
        }

        Ok(findings)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::aws::{AwsError, AwsResult};
    use crate::errors::AuditError;
    use crate::model::{AccessKey, AccessKeyStatus, LastLogin, RiskLevel};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::{HashMap, HashSet};

    /// In-memory provider snapshot with injectable failures
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) users: Vec<IamUser>,
        pub(crate) console: HashSet<String>,
        pub(crate) mfa: HashMap<String, usize>,
        pub(crate) keys: HashMap<String, Vec<AccessKey>>,
        pub(crate) root_mfa: bool,
        pub(crate) failing_mfa: HashSet<String>,
        pub(crate) failing_keys: HashSet<String>,
        pub(crate) failing_console: HashSet<String>,
        pub(crate) fail_list_users: bool,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn list_all_users(&self) -> AwsResult<Vec<IamUser>> {
            if self.fail_list_users {
                return Err(AwsError::iam("ListUsers", "AccessDenied"));
            }
            Ok(self.users.clone())
        }

        async fn has_console_access(&self, user_name: &str) -> AwsResult<bool> {
            if self.failing_console.contains(user_name) {
                return Err(AwsError::iam("GetLoginProfile", "ServiceFailure"));
            }
            Ok(self.console.contains(user_name))
        }

        async fn mfa_device_count(&self, user_name: &str) -> AwsResult<usize> {
            if self.failing_mfa.contains(user_name) {
                return Err(AwsError::iam("ListMFADevices", "Throttling"));
            }
            Ok(self.mfa.get(user_name).copied().unwrap_or(0))
        }

        async fn list_active_access_keys(&self, user_name: &str) -> AwsResult<Vec<AccessKey>> {
            if self.failing_keys.contains(user_name) {
                return Err(AwsError::iam("ListAccessKeys", "Throttling"));
            }
            Ok(self
                .keys
                .get(user_name)
                .map(|keys| {
                    keys.iter()
                        .filter(|k| k.status == AccessKeyStatus::Active)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn is_root_mfa_enabled(&self) -> AwsResult<bool> {
            Ok(self.root_mfa)
        }

        async fn caller_account_id(&self) -> AwsResult<String> {
            Ok("123456789012".to_string())
        }
    }

    pub(crate) fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
    }

    fn user(name: &str, created: DateTime<Utc>, last_login: Option<DateTime<Utc>>) -> IamUser {
        IamUser {
            user_name: name.to_string(),
            create_date: created,
            password_last_used: last_login,
        }
    }

    fn key(owner: &str, id: &str, status: AccessKeyStatus, created: DateTime<Utc>) -> AccessKey {
        AccessKey {
            user_name: owner.to_string(),
            access_key_id: id.to_string(),
            status,
            create_date: created,
        }
    }

    /// alice: console, no MFA. bob: API only, one 200 day old key.
    /// carol: console, never logged in, has MFA. dave: healthy.
    pub(crate) fn sample_provider() -> FakeProvider {
        let now = fixed_now();
        let jan_first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        FakeProvider {
            users: vec![
                user("alice", jan_first, Some(now - Duration::days(2))),
                user("bob", jan_first, None),
                user("carol", jan_first, None),
                user("dave", jan_first, Some(now - Duration::days(1))),
            ],
            console: ["alice", "carol", "dave"].iter().map(ToString::to_string).collect(),
            mfa: HashMap::from([
                ("bob".to_string(), 1),
                ("carol".to_string(), 1),
                ("dave".to_string(), 2),
            ]),
            keys: HashMap::from([
                (
                    "bob".to_string(),
                    vec![
                        key("bob", "AKIABOBOLDKEY0000001", AccessKeyStatus::Active, now - Duration::days(200)),
                        key("bob", "AKIABOBDISABLED00002", AccessKeyStatus::Inactive, now - Duration::days(500)),
                    ],
                ),
                (
                    "dave".to_string(),
                    vec![key("dave", "AKIADAVEFRESH0000001", AccessKeyStatus::Active, now - Duration::days(5))],
                ),
            ]),
            root_mfa: true,
            ..FakeProvider::default()
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_sample_account_findings() {
        let provider = sample_provider();
        let engine = AuditEngine::new(&provider, AuditConfig::default());

        let result = engine.run_all_checks_at(fixed_now()).await.unwrap();

        assert_eq!(result.total_users, 4);
        assert!(result.root_mfa_enabled);

        assert_eq!(result.users_without_mfa.len(), 1);
        let alice = &result.users_without_mfa[0];
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.risk, RiskLevel::High);
        assert_eq!(alice.created.to_string(), "2024-01-01");

        assert_eq!(result.old_access_keys.len(), 1);
        let bob = &result.old_access_keys[0];
        assert_eq!(bob.username, "bob");
        assert_eq!(bob.key_id, "AKIABOBO...");
        assert_eq!(bob.age_days, 200);

        assert_eq!(result.inactive_console_users.len(), 1);
        let carol = &result.inactive_console_users[0];
        assert_eq!(carol.username, "carol");
        assert_eq!(carol.last_login, LastLogin::Never);

        assert_eq!(result.issue_count(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_root_mfa_disabled() {
        let provider = FakeProvider {
            root_mfa: false,
            ..sample_provider()
        };
        let result = AuditEngine::new(&provider, AuditConfig::default())
            .run_all_checks_at(fixed_now())
            .await
            .unwrap();
        assert!(!result.root_mfa_enabled);
    }

    #[test_log::test(tokio::test)]
    async fn test_mfa_lookup_failure_fails_closed() {
        let mut provider = sample_provider();
        provider.failing_mfa.insert("dave".to_string());

        let result = AuditEngine::new(&provider, AuditConfig::default())
            .run_all_checks_at(fixed_now())
            .await
            .unwrap();

        assert_eq!(result.total_users, 4);
        let names: Vec<&str> = result
            .users_without_mfa
            .iter()
            .map(|f| f.username.as_str())
            .collect();
        assert_eq!(names, vec!["alice", "dave"]);
        assert_eq!(result.users_without_mfa[1].risk, RiskLevel::High);
    }

    #[test_log::test(tokio::test)]
    async fn test_access_key_failure_skips_user_only() {
        let mut provider = sample_provider();
        provider.failing_keys.insert("bob".to_string());
        provider.keys.insert(
            "alice".to_string(),
            vec![key("alice", "AKIAALICEOLD00000001", AccessKeyStatus::Active, fixed_now() - Duration::days(365))],
        );

        let result = AuditEngine::new(&provider, AuditConfig::default())
            .run_all_checks_at(fixed_now())
            .await
            .unwrap();

        assert_eq!(result.old_access_keys.len(), 1);
        assert_eq!(result.old_access_keys[0].username, "alice");
        assert_eq!(result.old_access_keys[0].age_days, 365);
    }

    #[test_log::test(tokio::test)]
    async fn test_list_users_failure_aborts() {
        let provider = FakeProvider {
            fail_list_users: true,
            ..sample_provider()
        };
        let err = AuditEngine::new(&provider, AuditConfig::default())
            .run_all_checks_at(fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Provider(AwsError::IamError { operation: "ListUsers", .. })));
    }

    #[test_log::test(tokio::test)]
    async fn test_login_profile_failure_aborts() {
        let mut provider = sample_provider();
        provider.failing_console.insert("carol".to_string());

        let err = AuditEngine::new(&provider, AuditConfig::default())
            .run_all_checks_at(fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuditError::Provider(AwsError::IamError { operation: "GetLoginProfile", .. })
        ));
    }

    #[test_log::test(tokio::test)]
    async fn test_findings_follow_listing_order() {
        let now = fixed_now();
        let created = now - Duration::days(400);
        let names = ["zed", "amy", "mike"];
        let provider = FakeProvider {
            users: names.iter().map(|n| user(n, created, None)).collect(),
            console: names.iter().map(ToString::to_string).collect(),
            keys: names
                .iter()
                .map(|n| {
                    (
                        (*n).to_string(),
                        vec![key(n, &format!("AKIA{}KEY000000000", n.to_uppercase()), AccessKeyStatus::Active, created)],
                    )
                })
                .collect(),
            ..FakeProvider::default()
        };

        let result = AuditEngine::new(&provider, AuditConfig::default())
            .run_all_checks_at(now)
            .await
            .unwrap();

        let mfa: Vec<_> = result.users_without_mfa.iter().map(|f| f.username.as_str()).collect();
        let keys: Vec<_> = result.old_access_keys.iter().map(|f| f.username.as_str()).collect();
        let inactive: Vec<_> = result
            .inactive_console_users
            .iter()
            .map(|f| f.username.as_str())
            .collect();
        assert_eq!(mfa, names);
        assert_eq!(keys, names);
        assert_eq!(inactive, names);
    }

    #[test_log::test(tokio::test)]
    async fn test_repeated_runs_are_identical() {
        let provider = sample_provider();
        let engine = AuditEngine::new(&provider, AuditConfig::default());

        let first = engine.run_all_checks_at(fixed_now()).await.unwrap();
        let second = engine.run_all_checks_at(fixed_now()).await.unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_out_of_range_threshold_aborts_before_listing() {
        let provider = FakeProvider {
            fail_list_users: true,
            ..sample_provider()
        };
        let err = AuditEngine::new(&provider, AuditConfig::new(i64::MAX, 90))
            .run_all_checks_at(fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidThreshold { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn test_custom_thresholds() {
        let provider = sample_provider();
        let engine = AuditEngine::new(&provider, AuditConfig::new(365, 1));

        let result = engine.run_all_checks_at(fixed_now()).await.unwrap();

        assert!(result.old_access_keys.is_empty());
        let inactive: Vec<_> = result
            .inactive_console_users
            .iter()
            .map(|f| f.username.as_str())
            .collect();
        assert_eq!(inactive, vec!["alice", "carol"]);
    }
}
