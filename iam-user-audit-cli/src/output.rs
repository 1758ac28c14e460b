use anyhow::{Context, Result};
use chrono::Local;
use iam_user_audit_core::{AuditConfig, AuditResult, Reporter};
use log::debug;
use std::io::{self, Write};
use std::path::Path;

pub(crate) fn error(msg: &str) {
    let _ = writeln!(io::stderr(), "iam-user-audit (error): {}", msg);
}

pub(crate) fn print_banner(account_id: &str) {
    let stdout = io::stdout();
    let mut w = stdout.lock();
    let _ = writeln!(w);
    let _ = writeln!(w, "=== AWS IAM Security Audit ===");
    let _ = writeln!(w, "Account: {}", account_id);
    let _ = writeln!(w, "Date:    {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(w);
}

/// Print the console summary and, when `output` is set, persist the JSON report.
pub(crate) fn output_audit_report(
    result: &AuditResult,
    account_id: &str,
    config: AuditConfig,
    output: Option<&Path>,
) -> Result<()> {
    let reporter = Reporter::new(result, account_id, config);

    reporter
        .print_summary()
        .context("Failed to write audit summary to stdout")?;

    if let Some(path) = output {
        debug!("Writing JSON report to {}", path.display());
        reporter
            .save_json(path)
            .with_context(|| format!("Failed to save report to {}", path.display()))?;
        let _ = writeln!(io::stdout());
        let _ = writeln!(io::stdout(), "Report saved to: {}", path.display());
    }

    Ok(())
}
