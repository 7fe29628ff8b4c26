// DltExport - core/selection.rs
//
// Maps a sequential export position to the record it stands for, under one
// of three scopes: every record, the filtered view, or rows the operator
// selected in the filtered view.

use crate::core::store::LogStore;
use std::fmt;
use std::str::FromStr;

/// Which subset of the store an export run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionScope {
    /// Every record in the store.
    #[default]
    All,
    /// Records passing the active filter.
    Filtered,
    /// Explicitly selected rows of the filtered view.
    Selected,
}

impl SelectionScope {
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Filtered => "filtered",
            Self::Selected => "selected",
        }
    }
}

impl fmt::Display for SelectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SelectionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "filtered" => Ok(Self::Filtered),
            "selected" => Ok(Self::Selected),
            other => Err(format!(
                "unknown selection scope '{other}' (expected all, filtered or selected)"
            )),
        }
    }
}

/// Normalised selection for one run.
///
/// Built once before the export loop: selected rows are sorted ascending and
/// de-duplicated here, so every later lookup sees a strictly ascending list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    scope: SelectionScope,
    rows: Vec<usize>,
}

impl Selection {
    /// Normalise `rows` for `scope`. Rows are ignored unless the scope is
    /// `Selected`.
    pub fn new(scope: SelectionScope, rows: &[usize]) -> Self {
        let rows = if scope == SelectionScope::Selected {
            let mut rows = rows.to_vec();
            rows.sort_unstable();
            rows.dedup();
            rows
        } else {
            Vec::new()
        };
        Self { scope, rows }
    }

    pub fn scope(&self) -> SelectionScope {
        self.scope
    }

    /// Normalised selected rows (filtered-view coordinates).
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Number of records the run will visit.
    pub fn total(&self, store: &dyn LogStore) -> usize {
        match self.scope {
            SelectionScope::All => store.total_count(),
            SelectionScope::Filtered => store.filtered_count(),
            SelectionScope::Selected => self.rows.len(),
        }
    }

    /// Absolute record index for export position `position`.
    pub fn index(&self, store: &dyn LogStore, position: usize) -> Option<usize> {
        match self.scope {
            SelectionScope::All => (position < store.total_count()).then_some(position),
            SelectionScope::Filtered => store.filtered_position(position),
            SelectionScope::Selected => self
                .rows
                .get(position)
                .and_then(|&row| store.filtered_position(row)),
        }
    }

    /// Record bytes for export position `position`.
    pub fn record_bytes<'s>(&self, store: &'s dyn LogStore, position: usize) -> Option<&'s [u8]> {
        match self.scope {
            SelectionScope::All => store.record_bytes(position),
            SelectionScope::Filtered => store.record_bytes_filtered(position),
            SelectionScope::Selected => self
                .rows
                .get(position)
                .and_then(|&row| store.record_bytes_filtered(row)),
        }
    }
}
