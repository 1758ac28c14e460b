//! IAM user audit CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use iam_user_audit_core::{
    AuditConfig, AuditEngine, AwsIdentityClient, IdentityProvider, DEFAULT_THRESHOLD_DAYS,
    MAX_THRESHOLD_DAYS,
};
use log::{debug, info};

mod output;

/// Read-only security audit of the IAM users in the current AWS account.
///
/// Credentials and region come from the standard AWS provider chain
/// (environment, shared config and credentials files, instance roles).
#[derive(Parser, Debug)]
#[command(name = "iam-user-audit", version, about, long_about = None)]
struct Cli {
    /// Also write the report as JSON to this file
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Active access keys created more than this many days ago are reported
    #[arg(long, value_name = "DAYS", default_value_t = DEFAULT_THRESHOLD_DAYS, value_parser = clap::value_parser!(i64).range(1..=MAX_THRESHOLD_DAYS))]
    max_key_age_days: i64,

    /// Console users who have not signed in for this many days are reported
    #[arg(long, value_name = "DAYS", default_value_t = DEFAULT_THRESHOLD_DAYS, value_parser = clap::value_parser!(i64).range(1..=MAX_THRESHOLD_DAYS))]
    max_inactive_days: i64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn audit_config(&self) -> AuditConfig {
        AuditConfig::new(self.max_key_age_days, self.max_inactive_days)
    }
}

/// Filter used when `RUST_LOG` is unset. Per-check progress is `info`.
fn default_log_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "warn"
    }
}

fn init_logging(debug: bool) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_log_level(debug)))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.audit_config();
    debug!("Audit configuration: {:?}", config);

    let client = AwsIdentityClient::from_env().await;

    let account_id = client
        .caller_account_id()
        .await
        .context("Failed to resolve the caller account")?;
    output::print_banner(&account_id);

    let result = AuditEngine::new(&client, config)
        .run_all_checks()
        .await
        .context("IAM audit failed")?;
    info!(
        "Audit complete: {} users, {} issues",
        result.total_users,
        result.issue_count()
    );

    output::output_audit_report(&result, &account_id, config, cli.output.as_deref())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
