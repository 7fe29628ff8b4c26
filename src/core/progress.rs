// DltExport - core/progress.rs
//
// Progress reporting contract for export runs. The interactive terminal
// observer lives in `app::progress`.

/// Receives progress notifications from the export driver.
pub trait ProgressObserver {
    /// The loop is about to visit `total` records.
    fn start(&mut self, total: usize);

    /// Record `current` (zero-based) is about to be processed.
    fn update(&mut self, current: usize);

    /// The loop has ended.
    fn done(&mut self);

    /// Whether the operator asked to stop. Checked before each record.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Observer for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn start(&mut self, _total: usize) {}

    fn update(&mut self, _current: usize) {}

    fn done(&mut self) {}
}

/// Converts record positions to whole percentages and reports a value only
/// when it is strictly greater than the last reported one.
#[derive(Debug, Default, Clone)]
pub struct PercentTracker {
    total: usize,
    last: u32,
}

impl PercentTracker {
    pub fn start(&mut self, total: usize) {
        self.total = total;
        self.last = 0;
    }

    /// Percentage to render for `current`, if it advanced.
    pub fn advance(&mut self, current: usize) -> Option<u32> {
        if self.total == 0 {
            return None;
        }
        let percent = (current as f64 / self.total as f64 * 100.0).round() as u32;
        if percent > self.last {
            self.last = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// Last rendered percentage.
    pub fn last(&self) -> u32 {
        self.last
    }
}
