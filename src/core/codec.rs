// DltExport - core/codec.rs
//
// DLT storage-format codec: record boundary indexing, parsing of stored
// records into `DltMessage`, and re-encoding back to storage bytes.
// Core layer: pure functions over byte slices.

use crate::core::model::{kind_of, type_info, Argument, ArgumentKind, DltMessage};
use crate::core::model::{ExtendedHeader, StorageHeader};
use crate::util::constants::{
    EXTENDED_HEADER_SIZE, ID_SIZE, STANDARD_HEADER_SIZE, STORAGE_HEADER_SIZE, STORAGE_PATTERN,
};
use crate::util::error::ParseError;
use std::borrow::Cow;
use std::ops::Range;

/// Header type flag bits.
mod htyp {
    pub const UEH: u8 = 0x01;
    pub const MSBF: u8 = 0x02;
    pub const WEID: u8 = 0x04;
    pub const WSID: u8 = 0x08;
    pub const WTMS: u8 = 0x10;
}

// =============================================================================
// Record indexing
// =============================================================================

/// Byte ranges of every record found in a storage buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    /// One range per record, in file order.
    pub ranges: Vec<Range<usize>>,

    /// Bytes skipped while re-synchronising past corrupt data.
    pub skipped_bytes: usize,
}

/// Locate record boundaries in the contents of a `.dlt` file.
///
/// Each record starts with the storage pattern; its size is taken from the
/// standard header length. Corrupt regions are skipped by searching for the
/// next storage pattern.
pub fn index_records(data: &[u8]) -> RecordIndex {
    let mut index = RecordIndex::default();
    let mut pos = 0;
    let min_record = STORAGE_HEADER_SIZE + STANDARD_HEADER_SIZE;

    while pos + min_record <= data.len() {
        if data[pos..pos + 4] == STORAGE_PATTERN[..] {
            let len_at = pos + STORAGE_HEADER_SIZE + 2;
            let len = usize::from(u16::from_be_bytes([data[len_at], data[len_at + 1]]));
            let end = pos + STORAGE_HEADER_SIZE + len;
            if len >= STANDARD_HEADER_SIZE && end <= data.len() {
                index.ranges.push(pos..end);
                pos = end;
                continue;
            }
        }

        let next = find_pattern(&data[pos + 1..]).map_or(data.len(), |offset| pos + 1 + offset);
        tracing::debug!(offset = pos, skipped = next - pos, "Re-synchronising record stream");
        index.skipped_bytes += next - pos;
        pos = next;
    }

    index.skipped_bytes += data.len() - pos;
    index
}

fn find_pattern(data: &[u8]) -> Option<usize> {
    data.windows(STORAGE_PATTERN.len())
        .position(|window| window == STORAGE_PATTERN)
}

// =============================================================================
// Parsing
// =============================================================================

/// Bounds-checked reader over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, section: &'static str) -> Result<&'a [u8], ParseError> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(ParseError::Truncated {
                section,
                needed: n,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, section: &'static str) -> Result<u8, ParseError> {
        Ok(self.take(1, section)?[0])
    }

    fn u16(&mut self, big_endian: bool, section: &'static str) -> Result<u16, ParseError> {
        let b = self.take(2, section)?;
        let bytes = [b[0], b[1]];
        Ok(if big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32(&mut self, big_endian: bool, section: &'static str) -> Result<u32, ParseError> {
        let b = self.take(4, section)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Ok(if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn id(&mut self, section: &'static str) -> Result<[u8; 4], ParseError> {
        let b = self.take(ID_SIZE, section)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Parse one stored record (storage header included).
///
/// Header problems are errors. A verbose payload whose arguments cannot all
/// be decoded still yields a message, carrying the arguments decoded before
/// the first problem.
pub fn parse_message(bytes: &[u8]) -> Result<DltMessage, ParseError> {
    let mut reader = Reader::new(bytes);

    let pattern = reader.take(4, "storage header")?;
    if pattern != STORAGE_PATTERN {
        return Err(ParseError::MissingStoragePattern);
    }
    let storage = StorageHeader {
        seconds: reader.u32(false, "storage header")?,
        microseconds: reader.u32(false, "storage header")?,
        ecu_id: reader.id("storage header")?,
    };

    let header_type = reader.u8("standard header")?;
    let counter = reader.u8("standard header")?;
    let declared = usize::from(reader.u16(true, "standard header")?);
    let available = bytes.len() - STORAGE_HEADER_SIZE;
    if declared < STANDARD_HEADER_SIZE || declared != available {
        return Err(ParseError::LengthMismatch {
            declared,
            available,
        });
    }

    let big_endian = header_type & htyp::MSBF != 0;
    let ecu_id = if header_type & htyp::WEID != 0 {
        Some(reader.id("standard header")?)
    } else {
        None
    };
    // Session id and timestamp are always network byte order.
    let session_id = if header_type & htyp::WSID != 0 {
        Some(reader.u32(true, "standard header")?)
    } else {
        None
    };
    let timestamp = if header_type & htyp::WTMS != 0 {
        Some(reader.u32(true, "standard header")?)
    } else {
        None
    };

    let extended = if header_type & htyp::UEH != 0 {
        let info = reader.u8("extended header")?;
        Some(ExtendedHeader {
            verbose: info & 0x01 != 0,
            message_type: (info >> 1) & 0x07,
            subtype: (info >> 4) & 0x0F,
            argument_count: reader.u8("extended header")?,
            app_id: reader.id("extended header")?,
            ctx_id: reader.id("extended header")?,
        })
    } else {
        None
    };

    let payload = reader.rest().to_vec();
    let arguments = match extended {
        Some(ext) if ext.verbose => parse_arguments(&payload, ext.argument_count, big_endian),
        _ => Vec::new(),
    };

    Ok(DltMessage {
        storage,
        version: header_type >> 5,
        big_endian,
        counter,
        ecu_id,
        session_id,
        timestamp,
        extended,
        payload,
        arguments,
    })
}

/// Decode up to `count` verbose arguments from `payload`.
pub fn parse_arguments(payload: &[u8], count: u8, big_endian: bool) -> Vec<Argument> {
    let mut reader = Reader::new(payload);
    let mut arguments = Vec::with_capacity(usize::from(count));

    for n in 0..count {
        if reader.is_empty() {
            tracing::debug!(declared = count, decoded = n, "Payload ended before all arguments");
            break;
        }
        match parse_argument(&mut reader, big_endian) {
            Ok(arg) => arguments.push(arg),
            Err(e) => {
                tracing::debug!(argument = n, error = %e, "Stopping argument decoding");
                break;
            }
        }
    }

    arguments
}

fn parse_argument(reader: &mut Reader<'_>, big_endian: bool) -> Result<Argument, ParseError> {
    let info = reader.u32(big_endian, "argument type info")?;
    let kind = kind_of(info).ok_or(ParseError::UnsupportedArgument { type_info: info })?;

    let len = match kind {
        ArgumentKind::Bool => type_info::width(info).unwrap_or(1),
        ArgumentKind::Signed | ArgumentKind::Unsigned | ArgumentKind::Float => {
            type_info::width(info).ok_or(ParseError::UnsupportedArgument { type_info: info })?
        }
        ArgumentKind::String | ArgumentKind::Raw => {
            usize::from(reader.u16(big_endian, "argument length")?)
        }
    };

    Ok(Argument {
        type_info: info,
        data: reader.take(len, "argument value")?.to_vec(),
        big_endian,
    })
}

// =============================================================================
// Serialisation
// =============================================================================

/// Encode arguments back into a verbose payload.
pub fn encode_arguments(arguments: &[Argument], big_endian: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for arg in arguments {
        let info = if big_endian {
            arg.type_info.to_be_bytes()
        } else {
            arg.type_info.to_le_bytes()
        };
        out.extend_from_slice(&info);
        if matches!(arg.kind(), Some(ArgumentKind::String | ArgumentKind::Raw)) {
            let len = arg.data.len() as u16;
            let len = if big_endian {
                len.to_be_bytes()
            } else {
                len.to_le_bytes()
            };
            out.extend_from_slice(&len);
        }
        out.extend_from_slice(&arg.data);
    }
    out
}

/// Re-encode a message, storage header included.
///
/// Verbose payloads are rebuilt from `arguments`; other payloads are written
/// as stored. Header flags follow the fields that are present, so an
/// unmodified well-formed record encodes to its original bytes.
pub fn serialize_message(msg: &DltMessage) -> Result<Vec<u8>, ParseError> {
    let payload: Cow<'_, [u8]> = if msg.is_verbose() {
        Cow::Owned(encode_arguments(&msg.arguments, msg.big_endian))
    } else {
        Cow::Borrowed(msg.payload.as_slice())
    };

    let mut header_type = (msg.version & 0x07) << 5;
    let mut length = STANDARD_HEADER_SIZE + payload.len();
    if msg.extended.is_some() {
        header_type |= htyp::UEH;
        length += EXTENDED_HEADER_SIZE;
    }
    if msg.big_endian {
        header_type |= htyp::MSBF;
    }
    if msg.ecu_id.is_some() {
        header_type |= htyp::WEID;
        length += ID_SIZE;
    }
    if msg.session_id.is_some() {
        header_type |= htyp::WSID;
        length += 4;
    }
    if msg.timestamp.is_some() {
        header_type |= htyp::WTMS;
        length += 4;
    }
    let encoded_length = u16::try_from(length).map_err(|_| ParseError::TooLong { length })?;

    let mut out = Vec::with_capacity(STORAGE_HEADER_SIZE + length);
    out.extend_from_slice(STORAGE_PATTERN);
    out.extend_from_slice(&msg.storage.seconds.to_le_bytes());
    out.extend_from_slice(&msg.storage.microseconds.to_le_bytes());
    out.extend_from_slice(&msg.storage.ecu_id);

    out.push(header_type);
    out.push(msg.counter);
    out.extend_from_slice(&encoded_length.to_be_bytes());
    if let Some(ecu) = &msg.ecu_id {
        out.extend_from_slice(ecu);
    }
    if let Some(session) = msg.session_id {
        out.extend_from_slice(&session.to_be_bytes());
    }
    if let Some(timestamp) = msg.timestamp {
        out.extend_from_slice(&timestamp.to_be_bytes());
    }

    if let Some(ext) = &msg.extended {
        out.push(u8::from(ext.verbose) | (ext.message_type & 0x07) << 1 | (ext.subtype & 0x0F) << 4);
        out.push(ext.argument_count);
        out.extend_from_slice(&ext.app_id);
        out.extend_from_slice(&ext.ctx_id);
    }

    out.extend_from_slice(&payload);
    Ok(out)
}
