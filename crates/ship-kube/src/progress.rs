//! Console progress for install runs
//!
//! Everything goes to stderr so stdout stays free for machine-readable output.
//! Waits get an indicatif spinner that is cleared once the wait ends.

use std::io::{self, Write};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::report::InstallReport;

/// Progress reporter for install runs
pub struct ProgressReporter {
    /// Whether anything is printed
    enabled: bool,
}

impl ProgressReporter {
    /// Create a reporter writing to stderr
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// Create a reporter that prints nothing
    pub fn hidden() -> Self {
        Self { enabled: false }
    }

    fn line(&self, text: std::fmt::Arguments<'_>) {
        if self.enabled {
            let _ = writeln!(io::stderr(), "{}", text);
        }
    }

    /// Print the header of a component
    pub fn component_start(&self, index: usize, total: usize, release: &str) {
        self.line(format_args!(
            "\n{} [{}/{}] {}",
            style("▶").cyan().bold(),
            index + 1,
            total,
            style(release).bold()
        ));
    }

    /// Chart install skipped because the release exists
    pub fn chart_skipped(&self, release: &str) {
        self.line(format_args!(
            "  {} Release {} already installed, skipping chart",
            style("⊘").dim(),
            release
        ));
    }

    pub fn chart_installing(&self, release: &str, chart: &str) {
        self.line(format_args!(
            "  {} Installing chart {} as {}",
            style("◐").cyan(),
            chart,
            release
        ));
    }

    /// Print a step notice
    pub fn step(&self, msg: &str) {
        self.line(format_args!("  {} {}", style("◑").blue(), msg));
    }

    /// Print success message
    pub fn success(&self, msg: &str) {
        self.line(format_args!("  {} {}", style("✓").green(), msg));
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        self.line(format_args!("  {} {}", style("⚠").yellow(), msg));
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        self.line(format_args!("  {} {}", style("✗").red(), msg));
    }

    /// Start a spinner for a wait; drop or finish it when the wait ends
    pub fn wait(&self, msg: String) -> WaitSpinner {
        let bar = if self.enabled {
            let bar = ProgressBar::new_spinner();
            if let Ok(spinner) = ProgressStyle::with_template("  {spinner:.yellow} {msg} ({elapsed})") {
                bar.set_style(spinner);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(msg);
        WaitSpinner { bar }
    }

    /// Print the final report: every error, every warning, then the summary
    pub fn print_report(&self, report: &InstallReport) {
        let errors = report.errors();

        if !report.warnings.is_empty() {
            self.line(format_args!("\n{}", style("Warnings:").yellow().bold()));
            for warning in &report.warnings {
                self.warn(warning);
            }
        }

        if !errors.is_empty() {
            self.line(format_args!("\n{}", style("Errors:").red().bold()));
            for error in &errors {
                self.error(&error.to_string());
            }
        }

        let elapsed = report.elapsed().num_milliseconds() as f64 / 1000.0;
        if report.is_success() {
            self.line(format_args!(
                "\n{} {} ({:.1}s)",
                style("✓").green().bold(),
                report.summary(),
                elapsed
            ));
        } else {
            self.line(format_args!(
                "\n{} {} ({:.1}s)",
                style("✗").red().bold(),
                report.summary(),
                elapsed
            ));
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Spinner shown while a wait is in progress
pub struct WaitSpinner {
    bar: ProgressBar,
}

impl Drop for WaitSpinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}
