// SPDX-License-Identifier: Apache-2.0

//! `load` and `verify`.

use std::io::Write;

use crate::harness::HarnessContext;

use super::error::{CommandError, CommandResult};

pub async fn load(ctx: &HarnessContext, out: &mut (dyn Write + Send)) -> CommandResult<()> {
    let (discovery, report) = ctx.load(out).await?;

    for rejected in &discovery.rejected {
        writeln!(out, "warning: skipped {}: {}", rejected.path.display(), rejected.error)?;
    }
    if discovery.fixtures.is_empty() {
        writeln!(out, "No *.csv fixtures in {}.", ctx.config.tables_dir.display())?;
        return Ok(());
    }

    if report.is_success() {
        writeln!(
            out,
            "Loaded {} table(s) into {} engine(s).",
            discovery.fixtures.len(),
            ctx.engines.len()
        )?;
        return Ok(());
    }

    let failures: Vec<String> = report.failures().map(|e| format!("  {e}")).collect();
    Err(CommandError::failed(format!(
        "{} load step(s) failed:\n{}",
        failures.len(),
        failures.join("\n")
    )))
}

pub async fn verify(ctx: &HarnessContext, out: &mut (dyn Write + Send)) -> CommandResult<()> {
    let checks = ctx.verify().await?;
    let mut mismatched = Vec::new();

    for check in &checks {
        let counts: Vec<String> = check
            .counts
            .iter()
            .map(|(backend, count)| match count {
                Ok(n) => format!("{backend} {n}"),
                Err(e) => format!("{backend} error ({e})"),
            })
            .collect();
        let mark = if check.agrees() { "✓" } else { "✗" };
        writeln!(out, "{}: {} {}", check.table, counts.join(", "), mark)?;
        if !check.agrees() {
            mismatched.push(check.table.to_string());
        }
    }

    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(CommandError::failed(format!(
            "row counts differ for: {}",
            mismatched.join(", ")
        )))
    }
}
