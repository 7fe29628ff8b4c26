// DltExport - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "DltExport";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "DltExport";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// DLT wire format
// =============================================================================

/// Magic pattern that opens every storage header in a `.dlt` file.
pub const STORAGE_PATTERN: &[u8; 4] = b"DLT\x01";

/// Size of the storage header (pattern + seconds + microseconds + ECU id).
pub const STORAGE_HEADER_SIZE: usize = 16;

/// Size of the mandatory part of the standard header.
pub const STANDARD_HEADER_SIZE: usize = 4;

/// Size of the extended header.
pub const EXTENDED_HEADER_SIZE: usize = 10;

/// Width of ECU, application and context identifiers.
pub const ID_SIZE: usize = 4;

/// Standard header version written into bits 5..7 of the header type byte.
pub const DLT_PROTOCOL_VERSION: u8 = 1;

/// Timestamp ticks per second (the standard header counts 0.1 ms units).
pub const TIMESTAMP_TICKS_PER_SECOND: u32 = 10_000;

// =============================================================================
// Export
// =============================================================================

/// CSV column names, in output order.
pub const CSV_HEADER: [&str; 13] = [
    "Index",
    "Time",
    "Timestamp",
    "Count",
    "Ecuid",
    "Apid",
    "Ctid",
    "SessionId",
    "Type",
    "Subtype",
    "Mode",
    "#Args",
    "Payload",
];

/// Character substituted for text that has no Latin-1 representation.
pub const LATIN1_REPLACEMENT: u8 = b'?';

/// Progress bar resolution (percent steps).
pub const PROGRESS_STEPS: u64 = 100;

/// Label shown next to the interactive progress bar.
pub const PROGRESS_LABEL: &str = "Export ...";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a payload excerpt included in debug output.
/// Prevents accidental exposure of sensitive data in long records.
pub const DEBUG_MAX_PAYLOAD_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default message catalog file name, looked up next to `config.toml`.
pub const CATALOG_FILE_NAME: &str = "catalog.toml";

/// Maximum size of a message catalog file in bytes.
pub const MAX_CATALOG_FILE_SIZE: u64 = 4 * 1024 * 1024; // 4 MB
