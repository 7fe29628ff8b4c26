// DltExport - app/progress.rs
//
// Interactive progress observer: a 0..100 terminal bar with operator
// cancellation.

use crate::core::progress::{PercentTracker, ProgressObserver};
use crate::util::constants::{PROGRESS_LABEL, PROGRESS_STEPS};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Terminal progress bar driven by the export loop.
///
/// The bar only moves when the rounded percentage increases, so large
/// exports redraw at most a hundred times.
pub struct ConsoleProgress {
    bar: ProgressBar,
    tracker: PercentTracker,
    cancel: Arc<AtomicBool>,
}

impl ConsoleProgress {
    /// Create an observer whose cancellation follows `cancel`.
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self::with_bar(ProgressBar::new(PROGRESS_STEPS), cancel)
    }

    /// Create an observer that never draws (for tests and piped output).
    pub fn hidden(cancel: Arc<AtomicBool>) -> Self {
        Self::with_bar(ProgressBar::hidden(), cancel)
    }

    fn with_bar(bar: ProgressBar, cancel: Arc<AtomicBool>) -> Self {
        match ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos:>3}%") {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => tracing::debug!(error = %e, "Progress template rejected; using default"),
        }
        bar.set_length(PROGRESS_STEPS);
        bar.set_message(PROGRESS_LABEL);
        Self {
            bar,
            tracker: PercentTracker::default(),
            cancel,
        }
    }

    /// Current bar position (percent).
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressObserver for ConsoleProgress {
    fn start(&mut self, total: usize) {
        self.tracker.start(total);
        self.bar.reset();
        self.bar.set_position(0);
    }

    fn update(&mut self, current: usize) {
        if let Some(percent) = self.tracker.advance(current) {
            self.bar.set_position(u64::from(percent));
        }
    }

    fn done(&mut self) {
        self.bar.finish_and_clear();
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_follows_percentage() {
        let mut progress = ConsoleProgress::hidden(Arc::new(AtomicBool::new(false)));
        progress.start(4);
        progress.update(0);
        assert_eq!(progress.position(), 0);
        progress.update(1);
        assert_eq!(progress.position(), 25);
        progress.update(3);
        assert_eq!(progress.position(), 75);
        progress.done();
    }

    #[test]
    fn test_cancel_flag_is_observed() {
        let cancel = Arc::new(AtomicBool::new(false));
        let progress = ConsoleProgress::hidden(Arc::clone(&cancel));
        assert!(!progress.is_cancelled());
        cancel.store(true, Ordering::Relaxed);
        assert!(progress.is_cancelled());
    }
}
