//! AWS SDK integration: IAM client wrapper, STS caller identity, user paging.

/// IAM client wrapper
pub mod iam_client;

/// sts calls
pub mod sts;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{AccessKey, IamUser};

pub use iam_client::AwsIdentityClient;

#[derive(Error, Debug)]
/// AWS Errors from AWS SDK calls
pub enum AwsError {
    #[error("IAM {operation} failed: {message}")]
    /// errors from calls to AWS IAM
    IamError {
        /// IAM operation name, e.g. `ListUsers`
        operation: &'static str,
        /// Rendered SDK error
        message: String,
    },
    #[error("STS error: {0}")]
    /// errors from calls to AWS STS
    StsError(String),
}

impl AwsError {
    pub(crate) fn iam(operation: &'static str, message: impl Into<String>) -> Self {
        Self::IamError {
            operation,
            message: message.into(),
        }
    }
}

/// Type of AWS Result extending Result
pub type AwsResult<T> = Result<T, AwsError>;

/// Read-only view of the identity provider consumed by the audit engine.
///
/// [`AwsIdentityClient`] implements it against IAM and STS; tests supply an
/// in-memory snapshot.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Every IAM user in the account, in listing order, across all pages.
    async fn list_all_users(&self) -> AwsResult<Vec<IamUser>>;

    /// Whether the user has a console password (login profile).
    ///
    /// A missing login profile is `Ok(false)`, never an error.
    async fn has_console_access(&self, user_name: &str) -> AwsResult<bool>;

    /// Number of MFA devices registered for the user.
    async fn mfa_device_count(&self, user_name: &str) -> AwsResult<usize>;

    /// Access keys of the user whose status is `Active`.
    async fn list_active_access_keys(&self, user_name: &str) -> AwsResult<Vec<AccessKey>>;

    /// True iff the account summary reports `AccountMFAEnabled == 1`.
    async fn is_root_mfa_enabled(&self) -> AwsResult<bool>;

    /// Account id of the credentials in use.
    async fn caller_account_id(&self) -> AwsResult<String>;
}
