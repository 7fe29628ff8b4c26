// DltExport - app/exporter.rs
//
// Wires one command-line request to an export run: opens the trace file,
// applies the filter, builds the decoder and sink, picks the progress
// observer, and runs the driver.

use crate::app::progress::ConsoleProgress;
use crate::app::reporter::ConsoleReporter;
use crate::core::decoder::{MessageCatalogPlugin, PluginManager};
use crate::core::export::{export_messages, ExportContext};
use crate::core::filter::FilterState;
use crate::core::format::ExportFormat;
use crate::core::model::ExportSummary;
use crate::core::progress::{ProgressObserver, SilentProgress};
use crate::core::selection::SelectionScope;
use crate::core::sink::MemorySink;
use crate::platform::catalog::load_catalog;
use crate::platform::dlt_file::DltFile;
use crate::platform::sink::FileSink;
use crate::util::error::{self, ConfigError};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Everything needed to run one export.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub input: PathBuf,

    /// Destination file. Required unless the format is clipboard.
    pub output: Option<PathBuf>,

    pub format: ExportFormat,
    pub scope: SelectionScope,

    /// Filtered-view rows for `SelectionScope::Selected`.
    pub rows: Vec<usize>,

    pub filter: FilterState,

    /// Non-interactive: no progress bar, quiet decoding.
    pub silent: bool,

    /// Message catalog for non-verbose decoding.
    pub catalog: Option<PathBuf>,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub summary: ExportSummary,

    /// Text published by the clipboard format.
    pub clipboard: Option<String>,
}

impl ExportOutcome {
    /// Whether machine-readable output must avoid stdout, which already
    /// carries the clipboard text.
    pub fn stdout_taken(&self) -> bool {
        self.clipboard.is_some()
    }
}

/// Progress observer for a run: silent runs get no bar and ignore `cancel`.
pub fn observer_for(silent: bool, cancel: Arc<AtomicBool>) -> Box<dyn ProgressObserver> {
    if silent {
        Box::new(SilentProgress)
    } else {
        Box::new(ConsoleProgress::new(cancel))
    }
}

/// Run `request`. Errors are setup failures; per-record and lifecycle
/// failures are reported through the summary.
pub fn run_export(
    request: &ExportRequest,
    cancel: Arc<AtomicBool>,
) -> error::Result<ExportOutcome> {
    let mut store = DltFile::open(&request.input)?;
    if !request.filter.is_empty() {
        store.apply_filter(&request.filter);
    }

    let mut decoder = PluginManager::new();
    if let Some(ref path) = request.catalog {
        let plugin = MessageCatalogPlugin::new(load_catalog(path)?);
        if plugin.is_empty() {
            tracing::warn!(path = %path.display(), "Message catalog has no entries");
        } else {
            tracing::debug!(entries = plugin.len(), "Catalog decoding enabled");
        }
        decoder.add(Box::new(plugin));
    }
    if decoder.is_empty() {
        tracing::debug!("No decoder plugins; messages are exported as stored");
    } else {
        tracing::debug!(plugins = decoder.len(), "Decoder plugins ready");
    }

    let reporter = ConsoleReporter;
    let ctx = ExportContext::new(&store, &decoder, &reporter)
        .with_scope(request.scope, request.rows.clone())
        .with_silent(request.silent);

    let mut observer = observer_for(request.silent, cancel);

    if !request.format.writes_file() {
        let mut sink = MemorySink::new();
        let summary = export_messages(&ctx, request.format, &mut sink, observer.as_mut());
        return Ok(ExportOutcome {
            summary,
            clipboard: sink.take_published(),
        });
    }

    let output = request
        .output
        .clone()
        .ok_or_else(|| ConfigError::ValueOutOfRange {
            field: "output".to_string(),
            value: String::new(),
            expected: format!("an output path for the '{}' format", request.format),
        })?;
    let mut sink = FileSink::new(output);
    let summary = export_messages(&ctx, request.format, &mut sink, observer.as_mut());
    Ok(ExportOutcome {
        summary,
        clipboard: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::serialize_message;
    use crate::core::model::{id_from_str, Argument, DltMessage, ExportState, ExtendedHeader};
    use crate::util::error::DltExportError;
    use std::sync::atomic::Ordering;

    fn write_trace(dir: &tempfile::TempDir) -> PathBuf {
        let mut bytes = Vec::new();
        for (app, text) in [("ONE", "first"), ("TWO", "second"), ("ONE", "third")] {
            let msg = DltMessage {
                extended: Some(ExtendedHeader {
                    verbose: true,
                    message_type: 0,
                    subtype: 4,
                    argument_count: 1,
                    app_id: id_from_str(app),
                    ctx_id: id_from_str("CTX"),
                }),
                arguments: vec![Argument::string(text, false)],
                ..Default::default()
            };
            bytes.extend(serialize_message(&msg).unwrap());
        }
        let path = dir.path().join("input.dlt");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn no_cancel() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_clipboard_request_returns_published_text() {
        let dir = tempfile::tempdir().unwrap();
        let request = ExportRequest {
            input: write_trace(&dir),
            format: ExportFormat::Clipboard,
            silent: true,
            ..Default::default()
        };
        let outcome = run_export(&request, no_cancel()).unwrap();
        assert_eq!(outcome.summary.counters.exported, 3);
        assert!(outcome.stdout_taken());
        let text = outcome.clipboard.unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_filtered_file_export() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let mut filter = FilterState::default();
        filter.app_ids.insert("ONE".to_string());
        let request = ExportRequest {
            input: write_trace(&dir),
            output: Some(output.clone()),
            format: ExportFormat::Utf8,
            scope: SelectionScope::Filtered,
            filter,
            silent: true,
            ..Default::default()
        };
        let outcome = run_export(&request, no_cancel()).unwrap();
        assert_eq!(outcome.summary.state, ExportState::Finished);
        assert!(!outcome.stdout_taken());
        let text = std::fs::read_to_string(output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0 ") && lines[0].ends_with(" first"));
        assert!(lines[1].starts_with("2 ") && lines[1].ends_with(" third"));
    }

    #[test]
    fn test_file_format_without_output_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = ExportRequest {
            input: write_trace(&dir),
            format: ExportFormat::Csv,
            silent: true,
            ..Default::default()
        };
        assert!(matches!(
            run_export(&request, no_cancel()),
            Err(DltExportError::Config(_))
        ));
    }

    #[test]
    fn test_interactive_observer_follows_cancel_flag() {
        let cancel = no_cancel();
        let observer = observer_for(false, Arc::clone(&cancel));
        assert!(!observer.is_cancelled());
        cancel.store(true, Ordering::Relaxed);
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_silent_observer_ignores_cancel_flag() {
        let cancel = Arc::new(AtomicBool::new(true));
        let observer = observer_for(true, cancel);
        assert!(!observer.is_cancelled());
    }

    #[test]
    fn test_interactive_request_exports_everything() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.dlt");
        let request = ExportRequest {
            input: write_trace(&dir),
            output: Some(output.clone()),
            format: ExportFormat::Dlt,
            silent: false,
            ..Default::default()
        };
        let outcome = run_export(&request, no_cancel()).unwrap();
        assert_eq!(outcome.summary.state, ExportState::Finished);
        assert_eq!(outcome.summary.counters.exported, 3);
        assert_eq!(
            std::fs::read(output).unwrap(),
            std::fs::read(&request.input).unwrap()
        );
    }

    #[test]
    fn test_missing_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = ExportRequest {
            input: dir.path().join("absent.dlt"),
            format: ExportFormat::Clipboard,
            silent: true,
            ..Default::default()
        };
        assert!(matches!(
            run_export(&request, no_cancel()),
            Err(DltExportError::Io { .. })
        ));
    }
}
