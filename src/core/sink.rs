// DltExport - core/sink.rs
//
// Destination abstraction for export runs. A sink is a byte stream that is
// opened once, written per record, and closed at the end of the run.
// Clipboard-style sinks additionally accept published text.

use std::io;

/// How a sink is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Binary record stream (DLT re-encoding).
    Binary,
    /// Line-oriented text (plain text and CSV).
    Text,
}

/// Byte-oriented export destination.
pub trait Sink {
    /// Acquire the destination, truncating previous content.
    fn open(&mut self, mode: OpenMode) -> io::Result<()>;

    /// Append bytes.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush and release the destination.
    fn close(&mut self) -> io::Result<()>;

    /// Make `text` available on the shared text target (clipboard).
    fn publish(&mut self, _text: &str) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("'{}' cannot receive clipboard text", self.name()),
        ))
    }

    /// Name used in operator messages.
    fn name(&self) -> String;
}

/// In-memory sink. Also serves as the shared clipboard target: published
/// text is kept until taken.
#[derive(Debug, Default)]
pub struct MemorySink {
    bytes: Vec<u8>,
    published: Option<String>,
    publish_count: usize,
    open: bool,
    mode: Option<OpenMode>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written since the last open.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Written bytes as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Most recently published clipboard text.
    pub fn published(&self) -> Option<&str> {
        self.published.as_deref()
    }

    /// Take the published clipboard text, leaving nothing behind.
    pub fn take_published(&mut self) -> Option<String> {
        self.published.take()
    }

    /// How many times text was published.
    pub fn publish_count(&self) -> usize {
        self.publish_count
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Mode of the last `open`.
    pub fn mode(&self) -> Option<OpenMode> {
        self.mode
    }
}

impl Sink for MemorySink {
    fn open(&mut self, mode: OpenMode) -> io::Result<()> {
        self.bytes.clear();
        self.open = true;
        self.mode = Some(mode);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "sink is not open"));
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.open = false;
        Ok(())
    }

    fn publish(&mut self, text: &str) -> io::Result<()> {
        self.published = Some(text.to_string());
        self.publish_count += 1;
        Ok(())
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}
