use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_iam::error::{DisplayErrorContext, SdkError};
use aws_sdk_iam::operation::get_login_profile::GetLoginProfileError;
use aws_sdk_iam::primitives::DateTime as SmithyDateTime;
use aws_sdk_iam::types::{AccessKeyMetadata, StatusType, SummaryKeyType, User};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use log::{debug, trace};

use crate::aws::{sts::caller_account_id, AwsError, AwsResult, IdentityProvider};
use crate::model::{AccessKey, AccessKeyStatus, IamUser};

/// Page size requested from `ListUsers`; IAM caps it at 1000, the CLI default is 100.
const LIST_USERS_PAGE_SIZE: i32 = 100;

/// One page of a marker-paginated IAM listing
pub(crate) struct Page<T> {
    pub(crate) items: Vec<T>,
    /// Marker for the next page, `None` once the listing is exhausted
    pub(crate) marker: Option<String>,
}

/// Follow IAM `Marker` pagination until the listing is exhausted.
///
/// The first request is sent without a marker. A failing page aborts the
/// whole listing.
pub(crate) async fn collect_pages<T, F, Fut>(mut fetch: F) -> AwsResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = AwsResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let mut page = fetch(marker.take()).await?;
        pages += 1;
        items.append(&mut page.items);

        match page.marker {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => break,
        }
    }

    trace!("Collected {} items across {} pages", items.len(), pages);
    Ok(items)
}

fn to_utc(value: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

impl TryFrom<&User> for IamUser {
    type Error = AwsError;

    fn try_from(user: &User) -> AwsResult<Self> {
        let create_date = to_utc(user.create_date()).ok_or_else(|| {
            AwsError::iam(
                "ListUsers",
                format!("CreateDate out of range for user {}", user.user_name()),
            )
        })?;

        Ok(Self {
            user_name: user.user_name().to_string(),
            create_date,
            password_last_used: user.password_last_used().and_then(to_utc),
        })
    }
}

/// Convert key metadata, dropping entries IAM returned without an id or creation date.
pub(crate) fn access_key_from_metadata(user_name: &str, meta: &AccessKeyMetadata) -> Option<AccessKey> {
    let (Some(access_key_id), Some(create_date)) =
        (meta.access_key_id(), meta.create_date().and_then(to_utc))
    else {
        debug!("Skipping incomplete access key metadata for {}", user_name);
        return None;
    };

    let status = if matches!(meta.status(), Some(StatusType::Active)) {
        AccessKeyStatus::Active
    } else {
        AccessKeyStatus::Inactive
    };

    Some(AccessKey {
        user_name: meta.user_name().unwrap_or(user_name).to_string(),
        access_key_id: access_key_id.to_string(),
        status,
        create_date,
    })
}

/// Keep only keys that can still sign requests.
pub(crate) fn active_only(keys: impl IntoIterator<Item = AccessKey>) -> Vec<AccessKey> {
    keys.into_iter()
        .filter(|key| key.status == AccessKeyStatus::Active)
        .collect()
}

/// Classify a `GetLoginProfile` outcome: a profile means console access,
/// `NoSuchEntity` means none, anything else is a provider error.
pub(crate) fn console_access_from<O, R: Debug>(
    user_name: &str,
    result: Result<O, SdkError<GetLoginProfileError, R>>,
) -> AwsResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(err)
            if err
                .as_service_error()
                .is_some_and(GetLoginProfileError::is_no_such_entity_exception) =>
        {
            trace!("No login profile for {}", user_name);
            Ok(false)
        }
        Err(err) => Err(AwsError::iam(
            "GetLoginProfile",
            format!("{}: {}", user_name, DisplayErrorContext(&err)),
        )),
    }
}

/// Root MFA is enabled iff the summary reports `AccountMFAEnabled == 1`; a missing entry counts as 0.
pub(crate) fn root_mfa_from_summary(summary: Option<&HashMap<SummaryKeyType, i32>>) -> bool {
    summary
        .and_then(|map| map.get(&SummaryKeyType::AccountMfaEnabled))
        .copied()
        .unwrap_or(0)
        == 1
}

/// Client wrapping AWS IAM and STS for the audit's read-only calls
pub struct AwsIdentityClient {
    pub(crate) iam: IamClient,
    pub(crate) sts: StsClient,
}

impl AwsIdentityClient {
    /// New construct from existing SDK clients
    #[must_use]
    pub const fn new(iam: IamClient, sts: StsClient) -> Self {
        Self { iam, sts }
    }

    /// Build both clients from one shared SDK configuration
    #[must_use]
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(IamClient::new(config), StsClient::new(config))
    }

    /// Load AWS configuration using the standard credential provider chain.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::from_conf(&config)
    }

    async fn list_users_page(&self, marker: Option<String>) -> AwsResult<Page<IamUser>> {
        let out = self
            .iam
            .list_users()
            .max_items(LIST_USERS_PAGE_SIZE)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| AwsError::iam("ListUsers", DisplayErrorContext(&e).to_string()))?;

        let items = out
            .users()
            .iter()
            .map(IamUser::try_from)
            .collect::<AwsResult<Vec<_>>>()?;

        Ok(Page {
            items,
            marker: out.marker().map(ToString::to_string),
        })
    }
}

#[async_trait]
impl IdentityProvider for AwsIdentityClient {
    async fn list_all_users(&self) -> AwsResult<Vec<IamUser>> {
        collect_pages(|marker| self.list_users_page(marker)).await
    }

    async fn has_console_access(&self, user_name: &str) -> AwsResult<bool> {
        let result = self.iam.get_login_profile().user_name(user_name).send().await;
        console_access_from(user_name, result)
    }

    async fn mfa_device_count(&self, user_name: &str) -> AwsResult<usize> {
        let out = self
            .iam
            .list_mfa_devices()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::iam(
                    "ListMFADevices",
                    format!("{}: {}", user_name, DisplayErrorContext(&e)),
                )
            })?;

        Ok(out.mfa_devices().len())
    }

    async fn list_active_access_keys(&self, user_name: &str) -> AwsResult<Vec<AccessKey>> {
        let out = self
            .iam
            .list_access_keys()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::iam(
                    "ListAccessKeys",
                    format!("{}: {}", user_name, DisplayErrorContext(&e)),
                )
            })?;

        Ok(active_only(
            out.access_key_metadata()
                .iter()
                .filter_map(|meta| access_key_from_metadata(user_name, meta)),
        ))
    }

    async fn is_root_mfa_enabled(&self) -> AwsResult<bool> {
        let out = self
            .iam
            .get_account_summary()
            .send()
            .await
            .map_err(|e| AwsError::iam("GetAccountSummary", DisplayErrorContext(&e).to_string()))?;

        Ok(root_mfa_from_summary(out.summary_map()))
    }

    async fn caller_account_id(&self) -> AwsResult<String> {
        caller_account_id(&self.sts).await
    }
}
