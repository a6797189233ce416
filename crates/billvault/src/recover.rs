// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `billvault recover` command implementation.
//!
//! Must run while the server is stopped or idle: it takes the vault's
//! exclusive section, but only within this process.

use billvault_config::model::BillvaultConfig;
use billvault_core::BillvaultError;
use billvault_vault::VaultEngine;
use billvault_vault::engine::RecoveryReport;

/// Runs the `billvault recover` command.
pub async fn run_recover(config: &BillvaultConfig, prune: bool) -> Result<(), BillvaultError> {
    let vault = VaultEngine::open_fs(&config.vault).await?;
    let report = vault.recover(prune).await?;
    print!("{}", render_report(&report));
    Ok(())
}

fn render_report(report: &RecoveryReport) -> String {
    let mut out = format!(
        "temp files removed: {}\nunreferenced payloads: {}\n",
        report.temp_files_removed,
        report.orphaned_payloads.len()
    );
    for key in &report.orphaned_payloads {
        out.push_str(&format!("  {key}\n"));
    }
    if !report.orphaned_payloads.is_empty() {
        if report.pruned {
            out.push_str("unreferenced payloads deleted\n");
        } else {
            out.push_str("run with --prune to delete them\n");
        }
    }
    out
}
