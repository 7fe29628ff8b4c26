// DltExport - core/filter.rs
//
// Composable filter engine for stored DLT records.
// All active filters are AND-combined.
// Core layer: pure logic, no I/O or UI dependencies.

use crate::core::codec;
use crate::core::model::DltMessage;
use crate::util::error::FilterError;
use regex::Regex;
use std::collections::HashSet;

/// Complete filter state. All fields are AND-combined when applied.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    /// ECU ids to include (empty = all).
    pub ecu_ids: HashSet<String>,

    /// Application ids to include (empty = all).
    pub app_ids: HashSet<String>,

    /// Context ids to include (empty = all).
    pub ctx_ids: HashSet<String>,

    /// Most verbose log level to include (1 = fatal .. 6 = verbose).
    /// Non-log messages are not affected. None = no level filter.
    pub max_log_level: Option<u8>,

    /// Substring payload search (case-insensitive). Empty = no filter.
    pub text_search: String,

    /// Compiled payload regex. None = no regex filter.
    pub regex_search: Option<Regex>,
}

impl FilterState {
    /// Returns true if no filters are active.
    pub fn is_empty(&self) -> bool {
        self.ecu_ids.is_empty()
            && self.app_ids.is_empty()
            && self.ctx_ids.is_empty()
            && self.max_log_level.is_none()
            && self.text_search.is_empty()
            && self.regex_search.is_none()
    }

    /// Set the regex search pattern, compiling it.
    /// Returns an error if the pattern is invalid.
    pub fn set_regex(&mut self, pattern: &str) -> Result<(), FilterError> {
        if pattern.is_empty() {
            self.regex_search = None;
            return Ok(());
        }
        let regex = Regex::new(pattern).map_err(|e| FilterError::InvalidRegex {
            pattern: pattern.to_string(),
            source: e,
        })?;
        self.regex_search = Some(regex);
        Ok(())
    }

    /// Create a quick-filter for fatal and error log messages.
    pub fn errors_only() -> Self {
        Self {
            max_log_level: Some(2),
            ..Default::default()
        }
    }
}

/// Apply filters to stored records, returning absolute indices of matches.
///
/// Records that cannot be parsed never match an active filter.
pub fn apply_filters<'a, I>(records: I, filter: &FilterState) -> Vec<usize>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let text_lower = filter.text_search.to_lowercase();
    let mut rejected = 0usize;

    let indices: Vec<usize> = records
        .into_iter()
        .enumerate()
        .filter(|(_, bytes)| match codec::parse_message(bytes) {
            Ok(msg) => matches_all(&msg, filter, &text_lower),
            Err(_) => {
                rejected += 1;
                false
            }
        })
        .map(|(idx, _)| idx)
        .collect();

    if rejected > 0 {
        tracing::debug!(rejected, "Unparseable records excluded by filter");
    }
    indices
}

/// Check if a single message matches all active filters.
pub fn matches_all(msg: &DltMessage, filter: &FilterState, text_lower: &str) -> bool {
    if !filter.ecu_ids.is_empty() && !filter.ecu_ids.contains(&msg.ecu_id()) {
        return false;
    }

    if !filter.app_ids.is_empty() && !filter.app_ids.contains(&msg.app_id()) {
        return false;
    }

    if !filter.ctx_ids.is_empty() && !filter.ctx_ids.contains(&msg.ctx_id()) {
        return false;
    }

    if let (Some(max), Some(level)) = (filter.max_log_level, msg.log_level()) {
        if level > max {
            return false;
        }
    }

    if text_lower.is_empty() && filter.regex_search.is_none() {
        return true;
    }

    let payload = msg.payload_text();

    if !text_lower.is_empty() && !payload.to_lowercase().contains(text_lower) {
        return false;
    }

    if let Some(ref regex) = filter.regex_search {
        if !regex.is_match(&payload) {
            return false;
        }
    }

    true
}
