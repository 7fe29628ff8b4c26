// DltExport - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation.
// All errors preserve the causal chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all DltExport operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum DltExportError {
    /// A record could not be parsed.
    Parse(ParseError),

    /// Export operation failed.
    Export(ExportError),

    /// Filter construction failed.
    Filter(FilterError),

    /// Configuration or catalog loading failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for DltExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Filter(e) => write!(f, "Filter error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for DltExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Filter(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Errors raised while decoding a record from its storage bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The buffer ended before a header or field was complete.
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    /// The record does not start with the storage header pattern.
    MissingStoragePattern,

    /// The standard header length disagrees with the buffer size.
    LengthMismatch { declared: usize, available: usize },

    /// A verbose argument uses a type this crate cannot decode.
    UnsupportedArgument { type_info: u32 },

    /// A re-encoded message does not fit the 16-bit length field.
    TooLong { length: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                section,
                needed,
                available,
            } => write!(
                f,
                "truncated {section}: need {needed} bytes, {available} available"
            ),
            Self::MissingStoragePattern => {
                write!(f, "record does not start with a DLT storage header")
            }
            Self::LengthMismatch {
                declared,
                available,
            } => write!(
                f,
                "standard header declares {declared} bytes but {available} are present"
            ),
            Self::UnsupportedArgument { type_info } => {
                write!(f, "unsupported argument type info {type_info:#010x}")
            }
            Self::TooLong { length } => {
                write!(f, "message of {length} bytes exceeds the 65535 byte limit")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for DltExportError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Category of an export failure, used to tally the run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Sink could not be acquired. Fatal before the loop.
    Open,
    /// One-time setup (e.g. header row) failed. Fatal before the loop.
    Prepare,
    /// Record bytes missing, empty or unparseable. Counted, loop continues.
    Read,
    /// Index translation or write failed. Counted, loop continues.
    Export,
    /// Sink could not be flushed, closed or published. Counted.
    Finish,
}

/// Why a record could not be read.
#[derive(Debug)]
pub enum ReadFailure {
    /// The store returned no buffer (position out of range).
    Missing,
    /// The store returned an empty buffer.
    Empty,
    /// The buffer could not be parsed.
    Malformed(ParseError),
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "record not found"),
            Self::Empty => write!(f, "record is empty"),
            Self::Malformed(e) => write!(f, "{e}"),
        }
    }
}

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// The sink could not be opened.
    Open { target: String, source: io::Error },

    /// One-time setup after open failed.
    Prepare { target: String, source: io::Error },

    /// Record bytes for a position could not be read.
    Read { position: usize, reason: ReadFailure },

    /// The export position has no underlying record index.
    Translate { position: usize },

    /// The transformed record could not be written.
    Write { position: usize, source: io::Error },

    /// The sink could not be flushed, closed or published.
    Finish { target: String, source: io::Error },
}

impl ExportError {
    /// Counter category for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Open { .. } => FailureKind::Open,
            Self::Prepare { .. } => FailureKind::Prepare,
            Self::Read { .. } => FailureKind::Read,
            Self::Translate { .. } | Self::Write { .. } => FailureKind::Export,
            Self::Finish { .. } => FailureKind::Finish,
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { target, source } => {
                write!(f, "Cannot open the export target '{target}': {source}")
            }
            Self::Prepare { target, source } => {
                write!(f, "Cannot write to export target '{target}': {source}")
            }
            Self::Read { position, reason } => {
                write!(f, "Cannot read record at position {position}: {reason}")
            }
            Self::Translate { position } => {
                write!(f, "Position {position} has no underlying record index")
            }
            Self::Write { position, source } => {
                write!(f, "Cannot write record at position {position}: {source}")
            }
            Self::Finish { target, source } => {
                write!(f, "Cannot finish export target '{target}': {source}")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. }
            | Self::Prepare { source, .. }
            | Self::Write { source, .. }
            | Self::Finish { source, .. } => Some(source),
            Self::Read {
                reason: ReadFailure::Malformed(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

impl From<ExportError> for DltExportError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

/// Errors related to filter operations.
#[derive(Debug)]
pub enum FilterError {
    /// User-provided regex is invalid.
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegex { pattern, source } => {
                write!(f, "Invalid filter regex '{pattern}': {source}")
            }
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
        }
    }
}

impl From<FilterError> for DltExportError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration and message catalog loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// A catalog file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// I/O error reading a config or catalog file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "'{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for DltExportError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for DltExport results.
pub type Result<T> = std::result::Result<T, DltExportError>;
