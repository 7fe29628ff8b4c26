// DltExport - core/format.rs
//
// Per-format export lifecycle: open the sink, optional one-time setup,
// read + decode a record, transform + write it, finish.
//
// One handler per output format, selected once per run by `create_handler`.

use crate::core::codec;
use crate::core::export::ExportContext;
use crate::core::model::{DltMessage, Record};
use crate::core::selection::Selection;
use crate::core::sink::{OpenMode, Sink};
use crate::core::store::LogStore;
use crate::util::constants::{CSV_HEADER, LATIN1_REPLACEMENT};
use crate::util::error::{ExportError, ParseError, ReadFailure};
use std::fmt;
use std::io;
use std::str::FromStr;

// =============================================================================
// Export format
// =============================================================================

/// Output representation of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Stored records written back verbatim.
    Dlt,
    /// Records decoded, then re-encoded with normalised argument counts.
    DltDecoded,
    /// One text line per record, Latin-1 encoded.
    Ascii,
    /// One text line per record, UTF-8 encoded.
    Utf8,
    /// Quoted comma-separated values with a header row.
    #[default]
    Csv,
    /// Text lines collected in memory and published to the clipboard.
    Clipboard,
}

impl ExportFormat {
    pub fn all() -> &'static [ExportFormat] {
        &[
            Self::Dlt,
            Self::DltDecoded,
            Self::Ascii,
            Self::Utf8,
            Self::Csv,
            Self::Clipboard,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Dlt => "dlt",
            Self::DltDecoded => "dlt-decoded",
            Self::Ascii => "ascii",
            Self::Utf8 => "utf8",
            Self::Csv => "csv",
            Self::Clipboard => "clipboard",
        }
    }

    /// Whether the format needs a file destination.
    pub fn writes_file(&self) -> bool {
        !matches!(self, Self::Clipboard)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|f| f.label() == lower)
            .or(match lower.as_str() {
                "decoded" => Some(Self::DltDecoded),
                "txt" | "text" => Some(Self::Ascii),
                "utf-8" => Some(Self::Utf8),
                _ => None,
            })
            .ok_or_else(|| {
                let names: Vec<_> = Self::all().iter().map(|f| f.label()).collect();
                format!("unknown export format '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

// =============================================================================
// Handler contract
// =============================================================================

/// Format-specific export lifecycle driven by `ExportDriver`.
pub trait FormatHandler {
    /// Acquire the sink. Failure aborts the run.
    fn open(&mut self) -> Result<(), ExportError>;

    /// One-time setup after `open`. Failure aborts the run.
    fn prepare(&mut self) -> Result<(), ExportError> {
        Ok(())
    }

    /// Fetch and parse the record at export position `position`.
    fn read(
        &mut self,
        ctx: &ExportContext<'_>,
        selection: &Selection,
        position: usize,
    ) -> Result<Record, ExportError> {
        read_record(ctx.store, selection, position)
    }

    /// Run the decoder over the record.
    fn decode(&mut self, ctx: &ExportContext<'_>, record: &mut Record) {
        ctx.decoder.decode(&mut record.message, ctx.silent);
    }

    /// Transform and write one record.
    fn export(
        &mut self,
        ctx: &ExportContext<'_>,
        selection: &Selection,
        position: usize,
        record: &Record,
    ) -> Result<(), ExportError>;

    /// Flush, close or publish.
    fn finish(&mut self) -> Result<(), ExportError>;
}

/// Read the record for `position` through the selection.
pub fn read_record(
    store: &dyn LogStore,
    selection: &Selection,
    position: usize,
) -> Result<Record, ExportError> {
    let bytes = selection
        .record_bytes(store, position)
        .ok_or(ExportError::Read {
            position,
            reason: ReadFailure::Missing,
        })?;
    if bytes.is_empty() {
        return Err(ExportError::Read {
            position,
            reason: ReadFailure::Empty,
        });
    }
    let message = codec::parse_message(bytes).map_err(|e| ExportError::Read {
        position,
        reason: ReadFailure::Malformed(e),
    })?;
    Ok(Record {
        bytes: bytes.to_vec(),
        message,
    })
}

/// Build the handler for `format`, taking ownership of the sink for the run.
pub fn create_handler<'s>(format: ExportFormat, sink: &'s mut dyn Sink) -> Box<dyn FormatHandler + 's> {
    match format {
        ExportFormat::Dlt => Box::new(RawHandler::new(sink)),
        ExportFormat::DltDecoded => Box::new(DecodedHandler::new(sink)),
        ExportFormat::Ascii => Box::new(TextHandler::new(sink, TextEncoding::Latin1)),
        ExportFormat::Utf8 => Box::new(TextHandler::new(sink, TextEncoding::Utf8)),
        ExportFormat::Csv => Box::new(CsvHandler::new(sink)),
        ExportFormat::Clipboard => Box::new(ClipboardHandler::new(sink)),
    }
}

fn translated_index(
    ctx: &ExportContext<'_>,
    selection: &Selection,
    position: usize,
) -> Result<usize, ExportError> {
    selection
        .index(ctx.store, position)
        .ok_or(ExportError::Translate { position })
}

fn open_sink(sink: &mut dyn Sink, mode: OpenMode) -> Result<(), ExportError> {
    sink.open(mode).map_err(|source| ExportError::Open {
        target: sink.name(),
        source,
    })
}

fn close_sink(sink: &mut dyn Sink) -> Result<(), ExportError> {
    sink.close().map_err(|source| ExportError::Finish {
        target: sink.name(),
        source,
    })
}

// =============================================================================
// Binary formats
// =============================================================================

/// Writes stored record bytes unchanged.
pub struct RawHandler<'s> {
    sink: &'s mut dyn Sink,
}

impl<'s> RawHandler<'s> {
    pub fn new(sink: &'s mut dyn Sink) -> Self {
        Self { sink }
    }
}

impl FormatHandler for RawHandler<'_> {
    fn open(&mut self) -> Result<(), ExportError> {
        open_sink(self.sink, OpenMode::Binary)
    }

    fn decode(&mut self, _ctx: &ExportContext<'_>, _record: &mut Record) {}

    fn export(
        &mut self,
        _ctx: &ExportContext<'_>,
        _selection: &Selection,
        position: usize,
        record: &Record,
    ) -> Result<(), ExportError> {
        self.sink
            .write(&record.bytes)
            .map_err(|source| ExportError::Write { position, source })
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        close_sink(self.sink)
    }
}

/// Decodes each record, sets its argument count to the number of decoded
/// arguments and writes the re-encoded bytes.
pub struct DecodedHandler<'s> {
    raw: RawHandler<'s>,

    /// Re-encoding failure of the record currently in flight.
    encode_error: Option<ParseError>,
}

impl<'s> DecodedHandler<'s> {
    pub fn new(sink: &'s mut dyn Sink) -> Self {
        Self {
            raw: RawHandler::new(sink),
            encode_error: None,
        }
    }
}

impl FormatHandler for DecodedHandler<'_> {
    fn open(&mut self) -> Result<(), ExportError> {
        self.raw.open()
    }

    fn decode(&mut self, ctx: &ExportContext<'_>, record: &mut Record) {
        ctx.decoder.decode(&mut record.message, ctx.silent);

        let dropped = record.message.undecoded_arguments();
        if dropped > 0 {
            tracing::warn!(
                declared = record.message.argument_count(),
                dropped,
                "Arguments not decoded are left out of the re-encoded record"
            );
        }

        let count = u8::try_from(record.message.arguments.len()).unwrap_or(u8::MAX);
        record.message.set_argument_count(count);

        self.encode_error = match codec::serialize_message(&record.message) {
            Ok(bytes) => {
                record.bytes = bytes;
                None
            }
            Err(e) => Some(e),
        };
    }

    fn export(
        &mut self,
        ctx: &ExportContext<'_>,
        selection: &Selection,
        position: usize,
        record: &Record,
    ) -> Result<(), ExportError> {
        if let Some(e) = self.encode_error.take() {
            return Err(ExportError::Write {
                position,
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            });
        }
        self.raw.export(ctx, selection, position, record)
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        self.raw.finish()
    }
}

// =============================================================================
// Plain text formats
// =============================================================================

/// Byte encoding of plain-text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// One byte per character; unrepresentable characters become `?`.
    Latin1,
    Utf8,
}

impl TextEncoding {
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Latin1 => to_latin1(text),
            Self::Utf8 => text.as_bytes().to_vec(),
        }
    }
}

/// Encode `text` as Latin-1.
pub fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(LATIN1_REPLACEMENT))
        .collect()
}

/// Trim and collapse every whitespace run to a single space.
pub fn simplified(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"<index> <header> <payload>\n"` with the payload whitespace-collapsed.
pub fn render_line(index: usize, message: &DltMessage) -> String {
    format!(
        "{index} {} {}\n",
        message.header_text(),
        simplified(&message.payload_text())
    )
}

/// Writes one text line per record to the sink.
pub struct TextHandler<'s> {
    sink: &'s mut dyn Sink,
    encoding: TextEncoding,
}

impl<'s> TextHandler<'s> {
    pub fn new(sink: &'s mut dyn Sink, encoding: TextEncoding) -> Self {
        Self { sink, encoding }
    }
}

impl FormatHandler for TextHandler<'_> {
    fn open(&mut self) -> Result<(), ExportError> {
        open_sink(self.sink, OpenMode::Text)
    }

    fn export(
        &mut self,
        ctx: &ExportContext<'_>,
        selection: &Selection,
        position: usize,
        record: &Record,
    ) -> Result<(), ExportError> {
        let index = translated_index(ctx, selection, position)?;
        let line = render_line(index, &record.message);
        self.sink
            .write(&self.encoding.encode(&line))
            .map_err(|source| ExportError::Write { position, source })
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        close_sink(self.sink)
    }
}

/// Collects text lines in memory and publishes them once, at finish.
pub struct ClipboardHandler<'s> {
    sink: &'s mut dyn Sink,
    buffer: String,
}

impl<'s> ClipboardHandler<'s> {
    pub fn new(sink: &'s mut dyn Sink) -> Self {
        Self {
            sink,
            buffer: String::new(),
        }
    }
}

impl FormatHandler for ClipboardHandler<'_> {
    fn open(&mut self) -> Result<(), ExportError> {
        // Nothing to acquire until publish.
        self.buffer.clear();
        Ok(())
    }

    fn export(
        &mut self,
        ctx: &ExportContext<'_>,
        selection: &Selection,
        position: usize,
        record: &Record,
    ) -> Result<(), ExportError> {
        let index = translated_index(ctx, selection, position)?;
        self.buffer.push_str(&render_line(index, &record.message));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        tracing::debug!(bytes = self.buffer.len(), "Publishing export to clipboard");
        self.sink
            .publish(&self.buffer)
            .map_err(|source| ExportError::Finish {
                target: self.sink.name(),
                source,
            })
    }
}

// =============================================================================
// CSV
// =============================================================================

/// The thirteen CSV fields of a record row.
pub fn csv_fields(position: usize, message: &DltMessage) -> [String; 13] {
    [
        position.to_string(),
        message.time_with_micros(),
        message.timestamp_string(),
        message.counter.to_string(),
        message.ecu_id(),
        message.app_id(),
        message.ctx_id(),
        message.session_id().to_string(),
        message.type_string().to_string(),
        message.subtype_string().to_string(),
        message.mode_string().to_string(),
        message.argument_count().to_string(),
        simplified(&message.payload_text()),
    ]
}

/// Encode one CSV row: every field double-quoted, embedded quotes doubled,
/// Latin-1 bytes, newline-terminated.
pub fn csv_row<S: AsRef<str>>(fields: &[S]) -> io::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .double_quote(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields.iter().map(|field| to_latin1(field.as_ref())))?;
    writer.into_inner().map_err(|e| e.into_error())
}

/// Writes a header row, then one quoted CSV row per record.
pub struct CsvHandler<'s> {
    sink: &'s mut dyn Sink,
}

impl<'s> CsvHandler<'s> {
    pub fn new(sink: &'s mut dyn Sink) -> Self {
        Self { sink }
    }
}

impl FormatHandler for CsvHandler<'_> {
    fn open(&mut self) -> Result<(), ExportError> {
        open_sink(self.sink, OpenMode::Text)
    }

    fn prepare(&mut self) -> Result<(), ExportError> {
        csv_row(&CSV_HEADER)
            .and_then(|row| self.sink.write(&row))
            .map_err(|source| ExportError::Prepare {
                target: self.sink.name(),
                source,
            })
    }

    fn export(
        &mut self,
        ctx: &ExportContext<'_>,
        selection: &Selection,
        position: usize,
        record: &Record,
    ) -> Result<(), ExportError> {
        translated_index(ctx, selection, position)?;
        csv_row(&csv_fields(position, &record.message))
            .and_then(|row| self.sink.write(&row))
            .map_err(|source| ExportError::Write { position, source })
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        close_sink(self.sink)
    }
}
