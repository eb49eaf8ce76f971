//! Terminal output for profwire commands

use colored::Colorize;
use std::fmt::Display;

/// Width of the label column in reports, colon included
const LABEL_WIDTH: usize = 14;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// First line of a report
pub fn heading(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg.bold());
}

/// One `label: value` line of a report, labels aligned.
pub fn field(label: &str, value: impl Display) {
    println!("  {} {}", label_column(label).dimmed(), value);
}

fn label_column(label: &str) -> String {
    format!("{:<width$}", format!("{}:", label), width = LABEL_WIDTH - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_align() {
        assert_eq!(label_column("profiler"), "profiler:    ");
        assert_eq!(label_column("wrapped type").len(), LABEL_WIDTH - 1);
        assert_eq!(label_column("a label longer than the column"), "a label longer than the column:");
    }
}
