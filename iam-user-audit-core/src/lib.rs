//! This crate provides the core logic of the IAM user audit:
//! - AWS identity client (IAM user paging, login profiles, MFA devices, access keys, account summary)
//! - Audit checks and the engine that runs them
//! - Console and JSON report rendering
//!

pub mod aws;
pub mod checks;
pub mod engine;
mod errors;
pub mod model;
pub mod report;

// Re-exports for a small, focused public API
pub use aws::{AwsError, AwsIdentityClient, AwsResult, IdentityProvider};
pub use checks::{AuditConfig, CheckWindow, DEFAULT_THRESHOLD_DAYS, MAX_THRESHOLD_DAYS};
pub use engine::AuditEngine;
pub use errors::{AuditError, Result};
pub use model::{
    AccessKey, AccessKeyStatus, AuditResult, IamUser, InactiveConsoleFinding, LastLogin,
    NoMfaFinding, RiskLevel, StaleKeyFinding, NEVER_LOGGED_IN,
};
pub use report::{ReportDocument, ReportSummary, Reporter};
