// DltExport - core/export.rs
//
// Export driver: runs one export of a record store into a sink.
// Sequence: normalise selection, open + prepare, per-record
// read/decode/export with failure counting, finish, summary.
//
// Core layer: talks to the store, decoder, sink and operator channel only
// through traits.

use crate::core::decoder::Decoder;
use crate::core::format::{create_handler, ExportFormat, FormatHandler};
use crate::core::model::{ExportCounters, ExportState, ExportSummary};
use crate::core::progress::ProgressObserver;
use crate::core::selection::{Selection, SelectionScope};
use crate::core::sink::Sink;
use crate::core::store::LogStore;
use crate::util::constants::DEBUG_MAX_PAYLOAD_PREVIEW;
use crate::util::error::{ExportError, FailureKind};
use crate::util::logging::preview;

/// Operator-facing error channel.
pub trait ErrorReporter {
    /// A fatal start-up error (the run was aborted).
    fn report(&self, message: &str);

    /// End-of-run summary, sent only when something went wrong.
    fn report_summary(&self, summary: &ExportSummary);
}

/// Everything an export run reads from its surroundings.
pub struct ExportContext<'a> {
    pub store: &'a dyn LogStore,
    pub decoder: &'a dyn Decoder,
    pub reporter: &'a dyn ErrorReporter,
    pub scope: SelectionScope,

    /// Filtered-view rows, used with `SelectionScope::Selected`.
    pub selected_rows: Vec<usize>,

    /// Non-interactive mode: no prompts, quiet decoders.
    pub silent: bool,
}

impl<'a> ExportContext<'a> {
    pub fn new(
        store: &'a dyn LogStore,
        decoder: &'a dyn Decoder,
        reporter: &'a dyn ErrorReporter,
    ) -> Self {
        Self {
            store,
            decoder,
            reporter,
            scope: SelectionScope::All,
            selected_rows: Vec::new(),
            silent: false,
        }
    }

    pub fn with_scope(mut self, scope: SelectionScope, selected_rows: Vec<usize>) -> Self {
        self.scope = scope;
        self.selected_rows = selected_rows;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Drives one export run through its format handler.
///
/// State moves Idle -> Started -> Running -> Finished, or to Aborted when
/// open/prepare fails (nothing is exported) or finish fails.
pub struct ExportDriver<'a> {
    ctx: &'a ExportContext<'a>,
    format: ExportFormat,
    handler: Box<dyn FormatHandler + 'a>,
    observer: &'a mut dyn ProgressObserver,
    state: ExportState,
    counters: ExportCounters,
}

impl<'a> ExportDriver<'a> {
    pub fn new(
        ctx: &'a ExportContext<'a>,
        format: ExportFormat,
        sink: &'a mut dyn Sink,
        observer: &'a mut dyn ProgressObserver,
    ) -> Self {
        Self {
            ctx,
            format,
            handler: create_handler(format, sink),
            observer,
            state: ExportState::Idle,
            counters: ExportCounters::default(),
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Run the export to completion and return its summary.
    pub fn run(mut self) -> ExportSummary {
        // Rows are sorted and de-duplicated once, before the first read.
        let selection = Selection::new(self.ctx.scope, &self.ctx.selected_rows);
        self.state = ExportState::Started;

        if let Err(e) = self.start() {
            tracing::error!(format = %self.format, error = %e, "Export could not start");
            self.tally(&e);
            self.state = ExportState::Aborted;
            self.ctx.reporter.report(&e.to_string());
            return self.summary(0, false);
        }

        let total = selection.total(self.ctx.store);
        tracing::info!(
            format = %self.format,
            scope = %selection.scope(),
            total,
            silent = self.ctx.silent,
            "Export started"
        );
        self.observer.start(total);
        self.state = ExportState::Running;

        let mut cancelled = false;
        for position in 0..total {
            if self.observer.is_cancelled() {
                tracing::info!(position, total, "Export cancelled");
                cancelled = true;
                break;
            }
            self.observer.update(position);
            self.export_one(&selection, position);
        }
        self.observer.done();

        self.state = ExportState::Finished;
        if let Err(e) = self.handler.finish() {
            tracing::warn!(format = %self.format, error = %e, "Export could not finish");
            self.tally(&e);
            self.state = ExportState::Aborted;
        }

        let summary = self.summary(total, cancelled);
        if summary.needs_attention() {
            tracing::warn!(
                exported = summary.counters.exported,
                read_errors = summary.counters.read_errors,
                export_errors = summary.counters.export_errors,
                lifecycle_errors = summary.counters.lifecycle_errors,
                cancelled,
                "Export completed with problems"
            );
            self.ctx.reporter.report_summary(&summary);
        } else {
            tracing::info!(exported = summary.counters.exported, total, "Export complete");
        }
        summary
    }

    fn start(&mut self) -> Result<(), ExportError> {
        self.handler.open()?;
        self.handler.prepare()
    }

    fn export_one(&mut self, selection: &Selection, position: usize) {
        let mut record = match self.handler.read(self.ctx, selection, position) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(position, error = %e, "Record skipped");
                self.tally(&e);
                return;
            }
        };

        self.handler.decode(self.ctx, &mut record);

        match self.handler.export(self.ctx, selection, position, &record) {
            Ok(()) => self.counters.exported += 1,
            Err(e) => {
                tracing::debug!(
                    position,
                    error = %e,
                    payload = %preview(&record.message.payload_text(), DEBUG_MAX_PAYLOAD_PREVIEW),
                    "Record not exported"
                );
                self.tally(&e);
            }
        }
    }

    fn tally(&mut self, error: &ExportError) {
        match error.kind() {
            FailureKind::Read => self.counters.read_errors += 1,
            FailureKind::Export => self.counters.export_errors += 1,
            FailureKind::Open | FailureKind::Prepare | FailureKind::Finish => {
                self.counters.lifecycle_errors += 1
            }
        }
    }

    fn summary(&self, total: usize, cancelled: bool) -> ExportSummary {
        ExportSummary {
            total,
            counters: self.counters,
            state: self.state,
            cancelled,
        }
    }
}

/// Export `ctx`'s scope in `format` to `sink`.
pub fn export_messages(
    ctx: &ExportContext<'_>,
    format: ExportFormat,
    sink: &mut dyn Sink,
    observer: &mut dyn ProgressObserver,
) -> ExportSummary {
    ExportDriver::new(ctx, format, sink, observer).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{parse_message, serialize_message};
    use crate::core::decoder::{MessageCatalogPlugin, PassThroughDecoder, PluginManager};
    use crate::core::model::{id_from_str, Argument, DltMessage, ExtendedHeader, StorageHeader};
    use crate::core::progress::SilentProgress;
    use crate::core::sink::{MemorySink, OpenMode};
    use crate::core::store::MemoryLogStore;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;

    // -------------------------------------------------------------------------
    // Test doubles
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingReporter {
        messages: RefCell<Vec<String>>,
        summaries: RefCell<Vec<ExportSummary>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }

        fn report_summary(&self, summary: &ExportSummary) {
            self.summaries.borrow_mut().push(summary.clone());
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        started: Vec<usize>,
        updates: Vec<usize>,
        done: usize,
        cancel_after: Option<usize>,
    }

    impl ProgressObserver for CountingObserver {
        fn start(&mut self, total: usize) {
            self.started.push(total);
        }

        fn update(&mut self, current: usize) {
            self.updates.push(current);
        }

        fn done(&mut self) {
            self.done += 1;
        }

        fn is_cancelled(&self) -> bool {
            self.cancel_after.is_some_and(|n| self.updates.len() >= n)
        }
    }

    /// Sink that fails at a chosen lifecycle step.
    #[derive(Default)]
    struct FaultySink {
        inner: MemorySink,
        fail_open: bool,
        fail_write_at: Option<usize>,
        fail_close: bool,
        writes: usize,
        closed: bool,
    }

    impl Sink for FaultySink {
        fn open(&mut self, mode: OpenMode) -> io::Result<()> {
            if self.fail_open {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.inner.open(mode)
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            let n = self.writes;
            self.writes += 1;
            if self.fail_write_at == Some(n) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.inner.write(bytes)
        }

        fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            if self.fail_close {
                return Err(io::Error::new(io::ErrorKind::Other, "flush failed"));
            }
            self.inner.close()
        }

        fn name(&self) -> String {
            "faulty".to_string()
        }
    }

    /// Decoder that remembers the silent flag of every call.
    #[derive(Default)]
    struct FlagRecordingDecoder {
        flags: RefCell<Vec<bool>>,
    }

    impl Decoder for FlagRecordingDecoder {
        fn decode(&self, _message: &mut DltMessage, silent: bool) {
            self.flags.borrow_mut().push(silent);
        }
    }

    /// Store whose filtered lookup disagrees with its filtered bytes.
    struct UntranslatableStore {
        records: Vec<Vec<u8>>,
    }

    impl LogStore for UntranslatableStore {
        fn total_count(&self) -> usize {
            self.records.len()
        }

        fn filtered_count(&self) -> usize {
            self.records.len()
        }

        fn record_bytes(&self, index: usize) -> Option<&[u8]> {
            self.records.get(index).map(Vec::as_slice)
        }

        fn record_bytes_filtered(&self, filtered_index: usize) -> Option<&[u8]> {
            self.record_bytes(filtered_index)
        }

        fn filtered_position(&self, _filtered_index: usize) -> Option<usize> {
            None
        }
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn message(counter: u8, text: &str) -> DltMessage {
        DltMessage {
            storage: StorageHeader {
                seconds: 0,
                microseconds: 5,
                ecu_id: *b"ECU1",
            },
            counter,
            timestamp: Some(12_345),
            extended: Some(ExtendedHeader {
                verbose: true,
                message_type: 0,
                subtype: 4,
                argument_count: 1,
                app_id: id_from_str("APP"),
                ctx_id: id_from_str("CTX"),
            }),
            arguments: vec![Argument::string(text, false)],
            ..Default::default()
        }
    }

    fn record(counter: u8, text: &str) -> Vec<u8> {
        serialize_message(&message(counter, text)).unwrap()
    }

    fn store_of(texts: &[&str]) -> MemoryLogStore {
        MemoryLogStore::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| record(i as u8, t))
                .collect(),
        )
    }

    fn run(
        store: &dyn LogStore,
        format: ExportFormat,
        scope: SelectionScope,
        rows: Vec<usize>,
        sink: &mut dyn Sink,
        observer: &mut dyn ProgressObserver,
        reporter: &RecordingReporter,
    ) -> ExportSummary {
        let ctx = ExportContext::new(store, &PassThroughDecoder, reporter)
            .with_scope(scope, rows)
            .with_silent(true);
        export_messages(&ctx, format, sink, observer)
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    // -------------------------------------------------------------------------
    // Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_empty_scope_still_opens_and_finishes() {
        let store = MemoryLogStore::new(Vec::new());
        let reporter = RecordingReporter::default();
        let mut observer = CountingObserver::default();
        let mut sink = FaultySink::default();

        let summary = run(
            &store,
            ExportFormat::Ascii,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut observer,
            &reporter,
        );

        assert_eq!(summary.total, 0);
        assert_eq!(summary.counters, ExportCounters::default());
        assert_eq!(summary.state, ExportState::Finished);
        assert_eq!(observer.started, vec![0]);
        assert!(observer.updates.is_empty());
        assert_eq!(observer.done, 1);
        assert!(sink.closed);
        assert!(sink.inner.bytes().is_empty());
        assert!(reporter.summaries.borrow().is_empty());
    }

    #[test]
    fn test_every_read_failing_is_counted() {
        let store = MemoryLogStore::new(vec![Vec::new(), b"garbage".to_vec(), Vec::new()]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();

        let summary = run(
            &store,
            ExportFormat::Utf8,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.counters.read_errors, 3);
        assert_eq!(summary.counters.exported, 0);
        assert_eq!(summary.state, ExportState::Finished);
        assert!(sink.bytes().is_empty());
        let summaries = reporter.summaries.borrow();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].message().contains("Exported successfully: 0 / 3"));
        assert!(summaries[0].message().contains("Read errors: 3"));
    }

    #[test]
    fn test_selected_rows_exported_in_ascending_order() {
        let store = store_of(&["zero", "one", "two"]);
        let reporter = RecordingReporter::default();
        let mut observer = CountingObserver::default();
        let mut sink = MemorySink::new();

        let summary = run(
            &store,
            ExportFormat::Ascii,
            SelectionScope::Selected,
            vec![2, 0],
            &mut sink,
            &mut observer,
            &reporter,
        );

        assert_eq!(summary.total, 2);
        assert_eq!(summary.counters.exported, 2);
        assert_eq!(observer.updates, vec![0, 1]);
        let text = sink.text();
        let lines = lines(&text);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0 "));
        assert!(lines[0].ends_with(" zero"));
        assert!(lines[1].starts_with("2 "));
        assert!(lines[1].ends_with(" two"));
        assert!(reporter.summaries.borrow().is_empty());
    }

    #[test]
    fn test_text_line_layout() {
        let store = store_of(&["  padded\t text  "]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();

        run(
            &store,
            ExportFormat::Utf8,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(
            sink.text(),
            "0 1970/01/01 00:00:00.000005 1.2345 0 ECU1 APP CTX 0 log info verbose 1 padded text\n"
        );
        assert_eq!(sink.mode(), Some(OpenMode::Text));
    }

    #[test]
    fn test_filtered_scope_prints_absolute_index() {
        let mut store = store_of(&["a", "b", "c", "d"]);
        store.set_filtered_indices(vec![1, 3]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();

        let summary = run(
            &store,
            ExportFormat::Ascii,
            SelectionScope::Filtered,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.total, 2);
        let text = sink.text();
        let lines = lines(&text);
        assert!(lines[0].starts_with("1 "));
        assert!(lines[1].starts_with("3 "));
    }

    #[test]
    fn test_raw_export_is_byte_identical() {
        let store = store_of(&["first", "second"]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();

        let summary = run(
            &store,
            ExportFormat::Dlt,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.counters.exported, 2);
        assert_eq!(sink.bytes(), [record(0, "first"), record(1, "second")].concat());
        assert_eq!(sink.mode(), Some(OpenMode::Binary));
    }

    #[test]
    fn test_decoded_export_normalises_argument_count() {
        let mut msg = message(0, "kept");
        msg.extended.as_mut().unwrap().argument_count = 3;
        let mut bytes = serialize_message(&msg).unwrap();
        // Append an argument with an unsupported type (array).
        let extra = [0x00u8, 0x01, 0x00, 0x00];
        bytes.extend_from_slice(&extra);
        let length = u16::from_be_bytes([bytes[18], bytes[19]]) + extra.len() as u16;
        bytes[18..20].copy_from_slice(&length.to_be_bytes());

        let store = MemoryLogStore::new(vec![bytes]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();
        let summary = run(
            &store,
            ExportFormat::DltDecoded,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.counters.exported, 1);
        let out = parse_message(sink.bytes()).unwrap();
        assert_eq!(out.argument_count(), 1);
        assert_eq!(out.arguments.len(), 1);
        assert_eq!(out.payload_text(), "kept");
    }

    #[test]
    fn test_decoded_export_applies_catalog() {
        let msg = DltMessage {
            extended: Some(ExtendedHeader {
                verbose: false,
                app_id: id_from_str("NV"),
                ..Default::default()
            }),
            payload: vec![42, 0, 0, 0, 0xab],
            ..Default::default()
        };
        let store = MemoryLogStore::new(vec![serialize_message(&msg).unwrap()]);
        let mut decoder = PluginManager::new();
        decoder.add(Box::new(MessageCatalogPlugin::new(HashMap::from([(
            42,
            "Door opened".to_string(),
        )]))));
        let reporter = RecordingReporter::default();
        let ctx = ExportContext::new(&store, &decoder, &reporter).with_silent(true);
        let mut sink = MemorySink::new();

        let summary = export_messages(&ctx, ExportFormat::DltDecoded, &mut sink, &mut SilentProgress);

        assert_eq!(summary.counters.exported, 1);
        let out = parse_message(sink.bytes()).unwrap();
        assert!(out.is_verbose());
        assert_eq!(out.argument_count(), 2);
        assert_eq!(out.payload_text(), "Door opened ab");
    }

    #[test]
    fn test_csv_export_header_and_quoting() {
        let store = store_of(&["say \"hi\", twice"]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();

        run(
            &store,
            ExportFormat::Csv,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        let text = sink.text();
        assert!(text.contains("\"say \"\"hi\"\", twice\""));

        let mut reader = csv::ReaderBuilder::new().from_reader(sink.bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 13);
        assert_eq!(&headers[0], "Index");
        assert_eq!(&headers[12], "Payload");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "0");
        assert_eq!(&rows[0][1], "1970/01/01 00:00:00.000005");
        assert_eq!(&rows[0][2], "1.2345");
        assert_eq!(&rows[0][4], "ECU1");
        assert_eq!(&rows[0][11], "1");
        assert_eq!(&rows[0][12], "say \"hi\", twice");
    }

    #[test]
    fn test_csv_index_is_export_position() {
        let mut store = store_of(&["a", "b", "c"]);
        store.set_filtered_indices(vec![2]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();

        run(
            &store,
            ExportFormat::Csv,
            SelectionScope::Filtered,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        let mut reader = csv::ReaderBuilder::new().from_reader(sink.bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "0");
        assert_eq!(&row[12], "c");
    }

    #[test]
    fn test_latin1_and_utf8_encodings() {
        let store = store_of(&["café €"]);
        let reporter = RecordingReporter::default();

        let mut ascii = MemorySink::new();
        run(&store, ExportFormat::Ascii, SelectionScope::All, vec![], &mut ascii, &mut SilentProgress, &reporter);
        assert!(ascii.bytes().ends_with(&[b'c', b'a', b'f', 0xe9, b' ', b'?', b'\n']));

        let mut utf8 = MemorySink::new();
        run(&store, ExportFormat::Utf8, SelectionScope::All, vec![], &mut utf8, &mut SilentProgress, &reporter);
        assert!(utf8.text().ends_with("café €\n"));
    }

    #[test]
    fn test_clipboard_publishes_once_at_finish() {
        let store = store_of(&["one", "two", "three"]);
        let reporter = RecordingReporter::default();
        let mut sink = MemorySink::new();

        let summary = run(
            &store,
            ExportFormat::Clipboard,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.counters.exported, 3);
        assert_eq!(sink.publish_count(), 1);
        assert_eq!(sink.mode(), None);
        let published = sink.published().unwrap();
        assert_eq!(published.lines().count(), 3);
        assert!(published.ends_with(" three\n"));
    }

    #[test]
    fn test_open_failure_aborts_before_reading() {
        let store = store_of(&["a"]);
        let reporter = RecordingReporter::default();
        let mut observer = CountingObserver::default();
        let mut sink = FaultySink {
            fail_open: true,
            ..Default::default()
        };

        let summary = run(
            &store,
            ExportFormat::Ascii,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut observer,
            &reporter,
        );

        assert_eq!(summary.state, ExportState::Aborted);
        assert_eq!(summary.counters.exported, 0);
        assert_eq!(summary.counters.lifecycle_errors, 1);
        assert!(observer.started.is_empty());
        assert!(!sink.closed);
        let messages = reporter.messages.borrow();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("faulty"));
    }

    #[test]
    fn test_csv_header_failure_aborts() {
        let store = store_of(&["a"]);
        let reporter = RecordingReporter::default();
        let mut sink = FaultySink {
            fail_write_at: Some(0),
            ..Default::default()
        };

        let summary = run(
            &store,
            ExportFormat::Csv,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.state, ExportState::Aborted);
        assert_eq!(summary.counters.exported, 0);
        assert_eq!(reporter.messages.borrow().len(), 1);
    }

    #[test]
    fn test_write_failure_is_counted_and_loop_continues() {
        let store = store_of(&["a", "b", "c"]);
        let reporter = RecordingReporter::default();
        let mut sink = FaultySink {
            fail_write_at: Some(1),
            ..Default::default()
        };

        let summary = run(
            &store,
            ExportFormat::Dlt,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.counters.exported, 2);
        assert_eq!(summary.counters.export_errors, 1);
        assert_eq!(summary.state, ExportState::Finished);
        assert_eq!(reporter.summaries.borrow().len(), 1);
    }

    #[test]
    fn test_finish_failure_is_reported() {
        let store = store_of(&["a"]);
        let reporter = RecordingReporter::default();
        let mut sink = FaultySink {
            fail_close: true,
            ..Default::default()
        };

        let summary = run(
            &store,
            ExportFormat::Dlt,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut SilentProgress,
            &reporter,
        );

        assert_eq!(summary.counters.exported, 1);
        assert_eq!(summary.counters.lifecycle_errors, 1);
        assert_eq!(summary.state, ExportState::Aborted);
        let summaries = reporter.summaries.borrow();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].message().contains("Start/finish errors: 1"));
    }

    #[test]
    fn test_untranslatable_position_is_export_failure() {
        let store = UntranslatableStore {
            records: vec![record(0, "x")],
        };
        let reporter = RecordingReporter::default();

        for format in [ExportFormat::Ascii, ExportFormat::Csv, ExportFormat::Clipboard] {
            let mut sink = MemorySink::new();
            let summary = run(
                &store,
                format,
                SelectionScope::Filtered,
                vec![],
                &mut sink,
                &mut SilentProgress,
                &reporter,
            );
            assert_eq!(summary.counters.export_errors, 1, "{format}");
            assert_eq!(summary.counters.exported, 0, "{format}");
        }
    }

    #[test]
    fn test_cancel_stops_loop_and_still_finishes() {
        let store = store_of(&["a", "b", "c", "d"]);
        let reporter = RecordingReporter::default();
        let mut observer = CountingObserver {
            cancel_after: Some(2),
            ..Default::default()
        };
        let mut sink = FaultySink::default();

        let summary = run(
            &store,
            ExportFormat::Utf8,
            SelectionScope::All,
            vec![],
            &mut sink,
            &mut observer,
            &reporter,
        );

        assert!(summary.cancelled);
        assert_eq!(summary.counters.exported, 2);
        assert_eq!(summary.state, ExportState::Finished);
        assert_eq!(observer.done, 1);
        assert!(sink.closed);
        assert_eq!(reporter.summaries.borrow().len(), 1);
        assert!(reporter.summaries.borrow()[0].message().contains("cancelled"));
    }

    #[test]
    fn test_decoder_receives_silent_flag() {
        let store = store_of(&["a", "b"]);
        let reporter = RecordingReporter::default();

        // Ascii uses the default decode step, DltDecoded its own override.
        for format in [ExportFormat::Ascii, ExportFormat::DltDecoded] {
            for silent in [false, true] {
                let decoder = FlagRecordingDecoder::default();
                let ctx = ExportContext::new(&store, &decoder, &reporter).with_silent(silent);
                let mut sink = MemorySink::new();
                let summary = export_messages(&ctx, format, &mut sink, &mut SilentProgress);

                assert_eq!(summary.counters.exported, 2, "{format}");
                assert_eq!(*decoder.flags.borrow(), vec![silent, silent], "{format}");
            }
        }
    }

    #[test]
    fn test_driver_starts_idle() {
        let store = MemoryLogStore::new(Vec::new());
        let reporter = RecordingReporter::default();
        let ctx = ExportContext::new(&store, &PassThroughDecoder, &reporter);
        let mut sink = MemorySink::new();
        let mut observer = SilentProgress;
        let driver = ExportDriver::new(&ctx, ExportFormat::Csv, &mut sink, &mut observer);
        assert_eq!(driver.state(), ExportState::Idle);
        assert_eq!(driver.run().state, ExportState::Finished);
    }
}
