// DltExport - platform/dlt_file.rs
//
// Memory-mapped DLT file store: record boundaries are indexed once at open
// by scanning for storage-header patterns; record bytes are served straight
// from the map.

use crate::core::codec::{self, RecordIndex};
use crate::core::filter::{self, FilterState};
use crate::core::store::LogStore;
use crate::util::error::{self, DltExportError};
use memmap2::Mmap;
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A `.dlt` file opened as a read-only log store.
#[derive(Debug)]
pub struct DltFile {
    path: PathBuf,

    /// `None` for an empty file (zero-length files cannot be mapped).
    map: Option<Mmap>,

    /// Byte range of every record, in file order.
    records: Vec<Range<usize>>,

    /// Absolute indices passing the active filter. `None` = no filter.
    filtered: Option<Vec<usize>>,
}

impl DltFile {
    /// Open and index `path`.
    pub fn open(path: &Path) -> error::Result<Self> {
        let io_err = |operation: &'static str| {
            let path = path.to_path_buf();
            move |source| DltExportError::Io {
                path,
                operation,
                source,
            }
        };

        let file = File::open(path).map_err(io_err("open"))?;
        let len = file.metadata().map_err(io_err("stat"))?.len();

        let map = if len == 0 {
            None
        } else {
            // SAFETY: the map is read-only and never mutated. Concurrent
            // truncation of the file by another process while it is mapped is
            // an accepted risk for reading already-written trace files.
            Some(unsafe { Mmap::map(&file) }.map_err(io_err("map"))?)
        };

        let RecordIndex {
            ranges,
            skipped_bytes,
        } = codec::index_records(map.as_deref().unwrap_or_default());

        if skipped_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                skipped_bytes,
                "Skipped bytes without a storage header"
            );
        }
        tracing::info!(
            path = %path.display(),
            bytes = len,
            records = ranges.len(),
            "DLT file indexed"
        );

        Ok(Self {
            path: path.to_path_buf(),
            map,
            records: ranges,
            filtered: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }

    /// Recompute the filtered view. An empty filter clears it.
    pub fn apply_filter(&mut self, filter: &FilterState) {
        if filter.is_empty() {
            self.filtered = None;
            return;
        }
        let data = self.data();
        let indices =
            filter::apply_filters(self.records.iter().map(|range| &data[range.clone()]), filter);
        tracing::debug!(
            matched = indices.len(),
            total = self.records.len(),
            "Filter applied"
        );
        self.filtered = Some(indices);
    }

    /// Install an explicit filtered view (sorted, de-duplicated, clipped).
    pub fn set_filtered_indices(&mut self, mut indices: Vec<usize>) {
        indices.sort_unstable();
        indices.dedup();
        indices.retain(|&i| i < self.records.len());
        self.filtered = Some(indices);
    }
}

impl LogStore for DltFile {
    fn total_count(&self) -> usize {
        self.records.len()
    }

    fn filtered_count(&self) -> usize {
        self.filtered.as_ref().map_or(self.records.len(), Vec::len)
    }

    fn record_bytes(&self, index: usize) -> Option<&[u8]> {
        let range = self.records.get(index)?;
        self.data().get(range.clone())
    }

    fn filtered_position(&self, filtered_index: usize) -> Option<usize> {
        match &self.filtered {
            Some(indices) => indices.get(filtered_index).copied(),
            None => (filtered_index < self.records.len()).then_some(filtered_index),
        }
    }
}
