// DltExport - platform/sink.rs
//
// File-backed export sink.

use crate::core::sink::{OpenMode, Sink};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes export output to a file, created or truncated on open.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn open(&mut self, mode: OpenMode) -> io::Result<()> {
        let file = File::create(&self.path)?;
        tracing::debug!(path = %self.path.display(), ?mode, "Export file opened");
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_all(bytes),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("'{}' is not open", self.path.display()),
            )),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.flush()?;
                // Pipes and character devices reject fsync.
                let file = writer.get_ref();
                if file.metadata()?.is_file() {
                    file.sync_all()?;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}
