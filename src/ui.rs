//! Terminal UI: spinners, stage lines and failure banners.
//!
//! # Design goals
//!
//! - **Quiet stages.** Short host operations (snapshot, mount, unmount) run behind a spinner and
//!   collapse into one `✓`/`✗` line.
//! - **Live archive.** borg's own output streams to stderr, so the archive stage prints a header
//!   instead of a spinner.
//! - **Loud stale mounts.** A failed unmount gets its own red banner, separate from ordinary
//!   failures.
//!
//! Spinners draw to stderr and hide themselves when it is not a terminal, so
//! cron/launchd runs produce only the stage lines.

use std::{error::Error, fmt::Display, time::Duration};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{archive::ArchiveOutcome, error::BackupError, pipeline::RunReport};

// ─── Icons ───────────────────────────────────────────────────────────────────

/// Braille spinner frames, as in indicatif's default.
static SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
fn icon_warn() -> console::StyledObject<&'static str> {
    style("!").yellow().bold()
}
fn icon_live() -> console::StyledObject<&'static str> {
    style("►").cyan().bold()
}
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Spinner ──────────────────────────────────────────────────────────────────

fn make_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let spinner_style = ProgressStyle::with_template("  {spinner:.cyan}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    pb.set_style(spinner_style);
    pb.set_message(format!("{}", style(label).dim()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ─── Stages ───────────────────────────────────────────────────────────────────

/// Run `f` behind a spinner and print its `✓`/`✗` line.
pub fn stage<T, E: Display>(label: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let spinner = make_spinner(label);
    let result = f();
    spinner.finish_and_clear();
    print_result(label, result.as_ref().err());
    result
}

/// Like [`stage`] but without a spinner, for stages whose child process
/// writes to the terminal itself.
pub fn live_stage<T, E: Display>(label: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    println!("  {}  {}", icon_live(), style(label).bold());
    let result = f();
    print_result(label, result.as_ref().err());
    result
}

fn print_result(label: &str, err: Option<&impl Display>) {
    match err {
        None => println!("  {}  {}", icon_ok(), style(label).bold()),
        Some(e) => println!(
            "  {}  {}  {}",
            icon_err(),
            style(label).bold(),
            style(e).dim()
        ),
    }
}

// ─── Summary banners ──────────────────────────────────────────────────────────

pub fn print_done(report: &RunReport) {
    println!();
    match report.outcome {
        ArchiveOutcome::Completed => println!(
            "  {} {} {}",
            icon_done(),
            style("Archive created:").cyan().bold(),
            report.archive_name
        ),
        ArchiveOutcome::Interrupted => println!(
            "  {} {} {} (snapshot {} deleted)",
            icon_warn(),
            style("Archive interrupted:").yellow().bold(),
            report.archive_name,
            report.snapshot
        ),
    }
    println!();
}

/// Ordinary failure: the message plus its cause chain.
pub fn print_failure(err: &(dyn Error + 'static)) {
    eprintln!();
    eprintln!("  {}  {}", icon_err(), style("Backup failed.").red().bold());
    for line in error_chain(err) {
        eprintln!("     {line}");
    }
    eprintln!();
}

/// The stale-mount case, plus the error the run had already hit.
pub fn print_manual_cleanup(err: &BackupError) {
    eprintln!();
    eprintln!(
        "  {}",
        style(" MANUAL CLEANUP REQUIRED ").white().on_red().bold()
    );
    for line in error_chain(err) {
        eprintln!("     {}", style(line).red());
    }
    if let Some(pending) = err.pending() {
        eprintln!();
        eprintln!("  {} the run had already failed:", style("►").dim());
        for line in error_chain(pending) {
            eprintln!("     {line}");
        }
    }
    eprintln!();
}

/// `err` followed by each of its sources, one line per level.
pub fn error_chain(err: &(dyn Error + 'static)) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines
}

// ─── Tests ────────────────────────────────────────────────────────────────────
