// DltExport - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no UI,
// no platform dependencies.
//
// A `DltMessage` is the decoded form of one stored DLT record. The wire
// layout lives in `core::codec`; this module owns the field accessors and
// the human-readable renderings shared by every text-based export format.

use crate::util::constants::TIMESTAMP_TICKS_PER_SECOND;
use chrono::DateTime;
use serde::Serialize;

// =============================================================================
// Headers
// =============================================================================

/// Storage header prepended to each record in a `.dlt` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageHeader {
    /// Wall-clock seconds since the Unix epoch when the record was stored.
    pub seconds: u32,

    /// Microsecond part of the storage time.
    pub microseconds: u32,

    /// ECU id recorded by the logger.
    pub ecu_id: [u8; 4],
}

/// Extended header: present on all verbose and most non-verbose messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedHeader {
    /// Payload is a sequence of self-describing arguments.
    pub verbose: bool,

    /// Message type (MSTP), 3 bits.
    pub message_type: u8,

    /// Message type info (MTIN), 4 bits. Interpreted per `message_type`.
    pub subtype: u8,

    /// Number of arguments declared in the header (NOAR).
    pub argument_count: u8,

    pub app_id: [u8; 4],

    pub ctx_id: [u8; 4],
}

// =============================================================================
// Message type
// =============================================================================

/// Message type as carried in the extended header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Log,
    AppTrace,
    NwTrace,
    Control,
    Unknown(u8),
}

impl MessageType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Log,
            1 => Self::AppTrace,
            2 => Self::NwTrace,
            3 => Self::Control,
            other => Self::Unknown(other),
        }
    }

    /// Label used in header text and CSV output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::AppTrace => "app_trace",
            Self::NwTrace => "nw_trace",
            Self::Control => "control",
            Self::Unknown(_) => "",
        }
    }

    /// Label for a subtype (MTIN) of this message type.
    pub fn subtype_label(&self, subtype: u8) -> &'static str {
        const LOG: [&str; 7] = ["", "fatal", "error", "warn", "info", "debug", "verbose"];
        const APP_TRACE: [&str; 6] = ["", "variable", "func_in", "func_out", "state", "vfb"];
        const NW_TRACE: [&str; 7] = ["", "ipc", "can", "flexray", "most", "ethernet", "someip"];
        const CONTROL: [&str; 4] = ["", "request", "response", "time"];

        let table: &[&'static str] = match self {
            Self::Log => &LOG,
            Self::AppTrace => &APP_TRACE,
            Self::NwTrace => &NW_TRACE,
            Self::Control => &CONTROL,
            Self::Unknown(_) => &[],
        };
        table.get(subtype as usize).copied().unwrap_or("")
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// Type info bits for verbose arguments.
pub mod type_info {
    pub const TYLE_MASK: u32 = 0x0000_000F;
    pub const BOOL: u32 = 0x0000_0010;
    pub const SINT: u32 = 0x0000_0020;
    pub const UINT: u32 = 0x0000_0040;
    pub const FLOA: u32 = 0x0000_0080;
    pub const ARAY: u32 = 0x0000_0100;
    pub const STRG: u32 = 0x0000_0200;
    pub const RAWD: u32 = 0x0000_0400;
    pub const VARI: u32 = 0x0000_0800;
    pub const FIXP: u32 = 0x0000_1000;
    pub const TRAI: u32 = 0x0000_2000;
    pub const STRU: u32 = 0x0000_4000;
    pub const SCOD_MASK: u32 = 0x0003_8000;
    pub const SCOD_UTF8: u32 = 0x0000_8000;

    /// Byte width encoded by the TYLE field, if defined.
    pub fn width(type_info: u32) -> Option<usize> {
        match type_info & TYLE_MASK {
            1 => Some(1),
            2 => Some(2),
            3 => Some(4),
            4 => Some(8),
            5 => Some(16),
            _ => None,
        }
    }
}

/// Value category of a verbose argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    String,
    Raw,
}

/// One verbose payload argument, kept in wire form so it can be re-encoded
/// exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// The 32-bit type info word.
    pub type_info: u32,

    /// Value bytes, excluding the type info and any length prefix.
    pub data: Vec<u8>,

    /// Byte order of `data` (and of the encoded type info).
    pub big_endian: bool,
}

impl Argument {
    /// A UTF-8 string argument. A terminating NUL is appended as loggers do.
    pub fn string(text: &str, big_endian: bool) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            type_info: type_info::STRG | type_info::SCOD_UTF8,
            data,
            big_endian,
        }
    }

    /// A raw byte block argument.
    pub fn raw(bytes: &[u8], big_endian: bool) -> Self {
        Self {
            type_info: type_info::RAWD,
            data: bytes.to_vec(),
            big_endian,
        }
    }

    /// A 32-bit unsigned integer argument.
    pub fn uint32(value: u32, big_endian: bool) -> Self {
        let data = if big_endian {
            value.to_be_bytes().to_vec()
        } else {
            value.to_le_bytes().to_vec()
        };
        Self {
            type_info: type_info::UINT | 3,
            data,
            big_endian,
        }
    }

    /// Classify the argument, `None` for types this crate cannot render.
    pub fn kind(&self) -> Option<ArgumentKind> {
        kind_of(self.type_info)
    }

    /// Human-readable rendering of the value.
    pub fn to_text(&self) -> String {
        match self.kind() {
            Some(ArgumentKind::Bool) => {
                let set = self.data.first().copied().unwrap_or(0) != 0;
                (if set { "true" } else { "false" }).to_string()
            }
            Some(ArgumentKind::Unsigned) => match self.data.len() {
                1 | 2 | 4 | 8 => self.unsigned_value().to_string(),
                _ => hex_string(&self.data),
            },
            Some(ArgumentKind::Signed) => match self.data.len() {
                1 | 2 | 4 | 8 => self.signed_value().to_string(),
                _ => hex_string(&self.data),
            },
            Some(ArgumentKind::Float) => match self.data.len() {
                4 => f32::from_bits(self.unsigned_value() as u32).to_string(),
                8 => f64::from_bits(self.unsigned_value()).to_string(),
                _ => hex_string(&self.data),
            },
            Some(ArgumentKind::String) => {
                let end = self
                    .data
                    .iter()
                    .rposition(|&b| b != 0)
                    .map_or(0, |last| last + 1);
                let bytes = &self.data[..end];
                if self.type_info & type_info::SCOD_MASK == type_info::SCOD_UTF8 {
                    String::from_utf8_lossy(bytes).into_owned()
                } else {
                    bytes.iter().map(|&b| b as char).collect()
                }
            }
            Some(ArgumentKind::Raw) | None => hex_string(&self.data),
        }
    }

    fn unsigned_value(&self) -> u64 {
        let mut buf = [0u8; 8];
        let n = self.data.len().min(8);
        if self.big_endian {
            buf[8 - n..].copy_from_slice(&self.data[..n]);
            u64::from_be_bytes(buf)
        } else {
            buf[..n].copy_from_slice(&self.data[..n]);
            u64::from_le_bytes(buf)
        }
    }

    fn signed_value(&self) -> i64 {
        let bits = (self.data.len().min(8) * 8) as u32;
        let raw = self.unsigned_value();
        if bits == 64 {
            raw as i64
        } else {
            // Sign-extend from the argument's width.
            let shift = 64 - bits;
            ((raw << shift) as i64) >> shift
        }
    }
}

/// Classify a type info word.
pub fn kind_of(info: u32) -> Option<ArgumentKind> {
    use type_info::*;
    if info & (ARAY | VARI | FIXP | TRAI | STRU) != 0 {
        return None;
    }
    if info & BOOL != 0 {
        Some(ArgumentKind::Bool)
    } else if info & SINT != 0 {
        Some(ArgumentKind::Signed)
    } else if info & UINT != 0 {
        Some(ArgumentKind::Unsigned)
    } else if info & FLOA != 0 {
        Some(ArgumentKind::Float)
    } else if info & STRG != 0 {
        Some(ArgumentKind::String)
    } else if info & RAWD != 0 {
        Some(ArgumentKind::Raw)
    } else {
        None
    }
}

/// Space-separated lowercase hex bytes.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a 4-byte identifier, dropping trailing NUL padding.
pub fn id_to_string(id: &[u8; 4]) -> String {
    id.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Pad an identifier to 4 bytes (truncating longer input).
pub fn id_from_str(text: &str) -> [u8; 4] {
    let mut id = [0u8; 4];
    for (slot, byte) in id.iter_mut().zip(text.bytes()) {
        *slot = byte;
    }
    id
}

// =============================================================================
// DLT message
// =============================================================================

/// A single DLT record with parsed headers and payload.
///
/// Optional standard-header fields are `Option`s so that re-encoding
/// reproduces exactly the header flags the record was stored with.
#[derive(Debug, Clone, PartialEq)]
pub struct DltMessage {
    pub storage: StorageHeader,

    /// Standard header version (bits 5..7 of the header type byte).
    pub version: u8,

    /// Payload and numeric header fields are big-endian (MSBF).
    pub big_endian: bool,

    /// Message counter.
    pub counter: u8,

    /// ECU id from the standard header (WEID).
    pub ecu_id: Option<[u8; 4]>,

    /// Session id (WSID).
    pub session_id: Option<u32>,

    /// Timestamp in 0.1 ms ticks (WTMS).
    pub timestamp: Option<u32>,

    /// Extended header (UEH).
    pub extended: Option<ExtendedHeader>,

    /// Payload bytes as stored.
    pub payload: Vec<u8>,

    /// Arguments decoded from a verbose payload.
    pub arguments: Vec<Argument>,
}

impl Default for DltMessage {
    fn default() -> Self {
        Self {
            storage: StorageHeader::default(),
            version: crate::util::constants::DLT_PROTOCOL_VERSION,
            big_endian: false,
            counter: 0,
            ecu_id: None,
            session_id: None,
            timestamp: None,
            extended: None,
            payload: Vec::new(),
            arguments: Vec::new(),
        }
    }
}

impl DltMessage {
    /// ECU id from the standard header, falling back to the storage header.
    pub fn ecu_id(&self) -> String {
        id_to_string(self.ecu_id.as_ref().unwrap_or(&self.storage.ecu_id))
    }

    pub fn app_id(&self) -> String {
        self.extended
            .as_ref()
            .map(|ext| id_to_string(&ext.app_id))
            .unwrap_or_default()
    }

    pub fn ctx_id(&self) -> String {
        self.extended
            .as_ref()
            .map(|ext| id_to_string(&ext.ctx_id))
            .unwrap_or_default()
    }

    pub fn session_id(&self) -> u32 {
        self.session_id.unwrap_or(0)
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp.unwrap_or(0)
    }

    pub fn microseconds(&self) -> u32 {
        self.storage.microseconds
    }

    pub fn is_verbose(&self) -> bool {
        self.extended.as_ref().is_some_and(|ext| ext.verbose)
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.extended
            .as_ref()
            .map(|ext| MessageType::from_raw(ext.message_type))
    }

    /// Log level (1 = fatal .. 6 = verbose) for log messages.
    pub fn log_level(&self) -> Option<u8> {
        match (self.message_type(), self.extended.as_ref()) {
            (Some(MessageType::Log), Some(ext)) => Some(ext.subtype),
            _ => None,
        }
    }

    pub fn type_string(&self) -> &'static str {
        self.message_type().map_or("", |t| t.label())
    }

    pub fn subtype_string(&self) -> &'static str {
        match (self.message_type(), self.extended.as_ref()) {
            (Some(t), Some(ext)) => t.subtype_label(ext.subtype),
            _ => "",
        }
    }

    pub fn mode_string(&self) -> &'static str {
        if self.is_verbose() {
            "verbose"
        } else {
            "non-verbose"
        }
    }

    /// Number of arguments declared in the extended header.
    pub fn argument_count(&self) -> u8 {
        self.extended.as_ref().map_or(0, |ext| ext.argument_count)
    }

    /// Set the declared argument count. No-op without an extended header.
    pub fn set_argument_count(&mut self, count: u8) {
        if let Some(ext) = self.extended.as_mut() {
            ext.argument_count = count;
        }
    }

    /// Declared verbose arguments that were not decoded, for example
    /// variable-info or array arguments. Zero for non-verbose messages.
    pub fn undecoded_arguments(&self) -> usize {
        if !self.is_verbose() {
            return 0;
        }
        usize::from(self.argument_count()).saturating_sub(self.arguments.len())
    }

    /// Storage time as `YYYY/MM/DD HH:MM:SS` (UTC).
    pub fn time_string(&self) -> String {
        DateTime::from_timestamp(i64::from(self.storage.seconds), 0)
            .map(|t| t.format("%Y/%m/%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }

    /// Storage time with microseconds: `"<time>.<us:06>"`.
    pub fn time_with_micros(&self) -> String {
        format!("{}.{:06}", self.time_string(), self.microseconds())
    }

    /// Timestamp ticks as seconds: `"<ts/10000>.<ts%10000:04>"`.
    pub fn timestamp_string(&self) -> String {
        format_timestamp(self.timestamp())
    }

    /// Message id of a non-verbose payload (first four payload bytes).
    pub fn message_id(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.payload.get(..4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    /// Header line used by the plain-text formats.
    pub fn header_text(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {} {} {}",
            self.time_with_micros(),
            self.timestamp_string(),
            self.counter,
            self.ecu_id(),
            self.app_id(),
            self.ctx_id(),
            self.session_id(),
            self.type_string(),
            self.subtype_string(),
            self.mode_string(),
            self.argument_count(),
        )
    }

    /// Human-readable payload.
    ///
    /// Verbose messages render their arguments separated by spaces;
    /// non-verbose messages render `[<message id>] <hex of remaining bytes>`.
    pub fn payload_text(&self) -> String {
        if self.is_verbose() {
            return self
                .arguments
                .iter()
                .map(Argument::to_text)
                .collect::<Vec<_>>()
                .join(" ");
        }
        match self.message_id() {
            Some(id) => format!("[{id}] {}", hex_string(&self.payload[4..])),
            None => hex_string(&self.payload),
        }
    }
}

/// Render timestamp ticks as `"<T/10000>.<T%10000 zero-padded to 4>"`.
pub fn format_timestamp(ticks: u32) -> String {
    format!(
        "{}.{:04}",
        ticks / TIMESTAMP_TICKS_PER_SECOND,
        ticks % TIMESTAMP_TICKS_PER_SECOND
    )
}

// =============================================================================
// Record (one loop iteration's worth of data)
// =============================================================================

/// A record read for export: the bytes handed to the sink plus the parsed
/// message. Lives for a single export iteration.
#[derive(Debug, Clone)]
pub struct Record {
    pub bytes: Vec<u8>,
    pub message: DltMessage,
}

// =============================================================================
// Export summary
// =============================================================================

/// Result counters of one export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportCounters {
    /// Records written successfully.
    pub exported: usize,

    /// Records whose bytes could not be read or parsed.
    pub read_errors: usize,

    /// Records that could not be translated or written.
    pub export_errors: usize,

    /// Open, prepare and finish failures.
    pub lifecycle_errors: usize,
}

impl ExportCounters {
    pub fn has_failures(&self) -> bool {
        self.read_errors > 0 || self.export_errors > 0 || self.lifecycle_errors > 0
    }
}

/// Driver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    Idle,
    Started,
    Running,
    Finished,
    Aborted,
}

/// Outcome of an export run, handed to the operator channel when anything
/// went wrong.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Records in the selected scope.
    pub total: usize,

    pub counters: ExportCounters,

    pub state: ExportState,

    /// The operator cancelled before every record was processed.
    pub cancelled: bool,
}

impl ExportSummary {
    /// Whether the run needs to be surfaced to the operator.
    pub fn needs_attention(&self) -> bool {
        self.cancelled || self.counters.has_failures()
    }

    /// Operator-facing summary text.
    pub fn message(&self) -> String {
        let mut text = format!(
            "Exported successfully: {} / {}\n\nRead errors: {}\nWrite errors: {}\nStart/finish errors: {}",
            self.counters.exported,
            self.total,
            self.counters.read_errors,
            self.counters.export_errors,
            self.counters.lifecycle_errors,
        );
        if self.cancelled {
            text.push_str("\n\nExport cancelled before completion.");
        }
        text
    }
}
