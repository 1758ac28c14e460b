use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;

use crate::aws::{AwsError, AwsResult};

/// Return the account ID of the credentials in use, via STS `GetCallerIdentity`.
///
/// Only used to label the report.
pub async fn caller_account_id(client: &StsClient) -> AwsResult<String> {
    let out = client.get_caller_identity().send().await.map_err(|e| {
        AwsError::StsError(format!("GetCallerIdentity failed: {}", DisplayErrorContext(&e)))
    })?;

    out.account()
        .map(ToString::to_string)
        .ok_or_else(|| AwsError::StsError("GetCallerIdentity response missing Account".to_string()))
}
