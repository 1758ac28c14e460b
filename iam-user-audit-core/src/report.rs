//! Console and JSON rendering of an [`AuditResult`].

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use colored::Colorize;
use derive_new::new;
use log::debug;
use serde::Serialize;

use crate::checks::AuditConfig;
use crate::errors::{AuditError, Result};
use crate::model::AuditResult;

/// Counts block of the JSON report
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportSummary {
    /// Number of IAM users listed
    pub total_users: usize,
    /// Number of users without MFA
    pub users_without_mfa: usize,
    /// Number of stale active access keys
    pub old_access_keys: usize,
    /// Number of inactive console users
    pub inactive_console_users: usize,
}

impl From<&AuditResult> for ReportSummary {
    fn from(result: &AuditResult) -> Self {
        Self {
            total_users: result.total_users,
            users_without_mfa: result.users_without_mfa.len(),
            old_access_keys: result.old_access_keys.len(),
            inactive_console_users: result.inactive_console_users.len(),
        }
    }
}

/// Persisted JSON report
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument<'a> {
    /// Audited account
    pub account_id: &'a str,
    /// ISO-8601 generation time
    pub generated_at: String,
    /// Finding counts
    pub summary: ReportSummary,
    /// Full audit result
    pub details: &'a AuditResult,
}

/// Renders one audit result for one account
#[derive(Debug, new)]
pub struct Reporter<'a> {
    result: &'a AuditResult,
    account_id: &'a str,
    config: AuditConfig,
}

impl<'a> Reporter<'a> {
    /// Print the summary to stdout.
    pub fn print_summary(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut w = stdout.lock();
        self.write_summary(&mut w)
    }

    /// Write the console summary: counts, one section per check, root MFA
    /// status and remediation hints for every category with findings.
    pub fn write_summary<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let result = self.result;

        writeln!(
            w,
            "Total users: {} | Issues found: {}",
            result.total_users,
            result.issue_count()
        )?;
        writeln!(w)?;

        let without_mfa = &result.users_without_mfa;
        if without_mfa.is_empty() {
            writeln!(w, "{}", "✅ All users have MFA enabled".green())?;
        } else {
            let title = format!("🔴 USERS WITHOUT MFA ({}) - HIGH RISK!", without_mfa.len());
            writeln!(w, "{}", title.red().bold())?;
            let rows: Vec<Vec<String>> = without_mfa
                .iter()
                .map(|f| {
                    vec![
                        f.username.clone(),
                        f.created.to_string(),
                        yes_no(f.has_console).to_string(),
                        f.risk.to_string(),
                    ]
                })
                .collect();
            write_table(w, &["User", "Created", "Console", "Risk"], &rows)?;
        }
        writeln!(w)?;

        let old_keys = &result.old_access_keys;
        if old_keys.is_empty() {
            writeln!(w, "{}", "✅ No stale access keys".green())?;
        } else {
            let title = format!(
                "🟡 ACCESS KEYS OLDER THAN {} DAYS ({})",
                self.config.max_key_age_days,
                old_keys.len()
            );
            writeln!(w, "{}", title.yellow().bold())?;
            let rows: Vec<Vec<String>> = old_keys
                .iter()
                .map(|k| {
                    vec![
                        k.username.clone(),
                        k.key_id.clone(),
                        k.created.to_string(),
                        format!("{} days", k.age_days),
                    ]
                })
                .collect();
            write_table(w, &["User", "Key (partial)", "Created", "Age"], &rows)?;
        }
        writeln!(w)?;

        let inactive = &result.inactive_console_users;
        if inactive.is_empty() {
            writeln!(w, "{}", "✅ No inactive users with console access".green())?;
        } else {
            let title = format!("🟡 INACTIVE USERS WITH CONSOLE ACCESS ({})", inactive.len());
            writeln!(w, "{}", title.yellow().bold())?;
            let rows: Vec<Vec<String>> = inactive
                .iter()
                .map(|u| vec![u.username.clone(), u.last_login.to_string(), u.created.to_string()])
                .collect();
            write_table(w, &["User", "Last Login", "Created"], &rows)?;
        }
        writeln!(w)?;

        if result.root_mfa_enabled {
            writeln!(w, "{}", "✅ Root account MFA: enabled".green())?;
        } else {
            writeln!(w, "{}", "🔴 Root account MFA: NOT ENABLED - CRITICAL".red().bold())?;
        }
        writeln!(w)?;

        writeln!(w, "--- RECOMMENDATIONS ---")?;
        if !without_mfa.is_empty() {
            writeln!(w, "1. Enable MFA for every user with console access")?;
            writeln!(w, "   -> aws iam create-virtual-mfa-device")?;
        }
        if !old_keys.is_empty() {
            writeln!(
                w,
                "2. Rotate old access keys (every {} days)",
                self.config.max_key_age_days
            )?;
            writeln!(w, "   -> aws iam create-access-key --user-name <user>")?;
            writeln!(
                w,
                "   -> aws iam delete-access-key --user-name <user> --access-key-id <old-key>"
            )?;
        }
        if !inactive.is_empty() {
            writeln!(w, "3. Review and disable inactive users")?;
            writeln!(w, "   -> aws iam delete-login-profile --user-name <user>")?;
        }
        if !result.root_mfa_enabled {
            writeln!(w, "4. Enable MFA on the root account from the root user's security credentials page")?;
        }

        Ok(())
    }

    /// Build the JSON document stamped with `generated_at`.
    pub fn document_at<Tz: TimeZone>(&self, generated_at: &DateTime<Tz>) -> ReportDocument<'a>
    where
        Tz::Offset: fmt::Display,
    {
        ReportDocument {
            account_id: self.account_id,
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            summary: ReportSummary::from(self.result),
            details: self.result,
        }
    }

    /// Serialize the report, stamped with the current local time, as indented JSON.
    pub fn to_json(&self) -> Result<String> {
        let document = self.document_at(&Local::now());
        serde_json::to_string_pretty(&document).map_err(|e| AuditError::json("audit report", e))
    }

    /// Write the JSON report to `path`, replacing any existing file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| AuditError::file_system("write", path, e))?;
        debug!("Audit report written to {}", path.display());
        Ok(())
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn render_row<'c>(cells: impl Iterator<Item = &'c str>, widths: &[usize]) -> String {
    cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Left-aligned plain-text table with a dashed rule under the headers.
fn write_table<W: Write>(w: &mut W, headers: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    writeln!(w, "{}", render_row(headers.iter().copied(), &widths))?;
    writeln!(
        w,
        "{}",
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  ")
    )?;
    for row in rows {
        writeln!(w, "{}", render_row(row.iter().map(String::as_str), &widths))?;
    }
    Ok(())
}
