//! Terminal output utilities
//!
//! Everything except errors and warnings is suppressed under `--quiet`, and
//! progress bars are hidden so nothing redraws over piped output.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use console::style;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

static QUIET: AtomicBool = AtomicBool::new(false);

pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

pub fn success(msg: impl Display) {
    if !quiet() {
        println!("{} {}", style("✓").green().bold(), msg);
    }
}

pub fn error(msg: impl Display) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

pub fn warning(msg: impl Display) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

pub fn info(msg: impl Display) {
    if !quiet() {
        println!("{} {}", style("ℹ").blue().bold(), msg);
    }
}

pub fn header(msg: impl Display) {
    if !quiet() {
        println!("\n{}", style(msg).bold().underlined());
    }
}

/// Indented `key: value` line
pub fn kv(key: &str, value: impl Display) {
    if !quiet() {
        println!("  {}: {}", style(key).dim(), value);
    }
}

/// Spinner for a step of unknown length
pub fn spinner(msg: &str) -> ProgressBar {
    if quiet() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Bar counting files through one phase of a sync
pub fn phase_bar(files: usize, phase: &str) -> ProgressBar {
    if quiet() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(files as u64).with_style(
        ProgressStyle::with_template(
            "{msg:>11.bold} [{bar:40.cyan/blue}] {pos}/{len} files ({elapsed}, eta {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    pb.set_message(phase.to_string());
    pb.enable_steady_tick(Duration::from_millis(250));
    pb
}

pub fn bytes(n: u64) -> String {
    HumanBytes(n).to_string()
}
