// DltExport - app/reporter.rs
//
// Operator error channel for the command line: messages go to stderr.

use crate::core::export::ErrorReporter;
use crate::core::model::ExportSummary;

/// Prints start-up errors and problem summaries to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ErrorReporter for ConsoleReporter {
    fn report(&self, message: &str) {
        eprintln!("Export error: {message}");
    }

    fn report_summary(&self, summary: &ExportSummary) {
        eprintln!("Export Errors\n\n{}", summary.message());
    }
}
