// DltExport - core/store.rs
//
// Read-only log store abstraction consumed by the export pipeline, plus an
// in-memory implementation. The memory-mapped file store lives in
// `platform::dlt_file`.

use crate::core::filter::{self, FilterState};

/// Random-access view over stored records and the active filter.
///
/// Absolute indices address every record; filtered indices address the
/// subset passing the active filter, in ascending absolute order.
pub trait LogStore {
    /// Number of records in the store.
    fn total_count(&self) -> usize;

    /// Number of records passing the active filter.
    fn filtered_count(&self) -> usize;

    /// Record bytes by absolute index.
    fn record_bytes(&self, index: usize) -> Option<&[u8]>;

    /// Record bytes by filtered index.
    fn record_bytes_filtered(&self, filtered_index: usize) -> Option<&[u8]> {
        self.filtered_position(filtered_index)
            .and_then(|index| self.record_bytes(index))
    }

    /// Absolute index of the record at `filtered_index`.
    fn filtered_position(&self, filtered_index: usize) -> Option<usize>;
}

/// Log store holding owned record buffers.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    records: Vec<Vec<u8>>,

    /// Absolute indices passing the filter. `None` = no filter active.
    filtered: Option<Vec<usize>>,
}

impl MemoryLogStore {
    pub fn new(records: Vec<Vec<u8>>) -> Self {
        Self {
            records,
            filtered: None,
        }
    }

    /// Install an explicit filtered view. Indices are sorted, de-duplicated
    /// and clipped to the store size.
    pub fn set_filtered_indices(&mut self, mut indices: Vec<usize>) {
        indices.sort_unstable();
        indices.dedup();
        indices.retain(|&i| i < self.records.len());
        self.filtered = Some(indices);
    }

    /// Recompute the filtered view from `filter`.
    pub fn apply_filter(&mut self, filter: &FilterState) {
        if filter.is_empty() {
            self.filtered = None;
            return;
        }
        let indices = filter::apply_filters(self.records.iter().map(Vec::as_slice), filter);
        self.filtered = Some(indices);
    }

    pub fn clear_filter(&mut self) {
        self.filtered = None;
    }
}

impl LogStore for MemoryLogStore {
    fn total_count(&self) -> usize {
        self.records.len()
    }

    fn filtered_count(&self) -> usize {
        self.filtered
            .as_ref()
            .map_or(self.records.len(), Vec::len)
    }

    fn record_bytes(&self, index: usize) -> Option<&[u8]> {
        self.records.get(index).map(Vec::as_slice)
    }

    fn filtered_position(&self, filtered_index: usize) -> Option<usize> {
        match &self.filtered {
            Some(indices) => indices.get(filtered_index).copied(),
            None => (filtered_index < self.records.len()).then_some(filtered_index),
        }
    }
}
