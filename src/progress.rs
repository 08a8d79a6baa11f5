// Progress bar management using indicatif.
// We keep all bars under one MultiProgress so they render on separate lines.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ProgressManager {
    multi: Option<Arc<MultiProgress>>,
}

impl ProgressManager {
    // Create a new manager. If enabled=false, no bars are created.
    pub fn new(enabled: bool) -> Self {
        let multi = if enabled {
            Some(Arc::new(MultiProgress::new()))
        } else {
            None
        };
        Self { multi }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    // Bar counting input files as they are extracted.
    pub fn new_file_bar(&self, total: u64) -> Option<ProgressBar> {
        self.new_counter(total, "Extracting files")
    }

    // Bar counting reconciled tables.
    pub fn new_table_bar(&self, total: u64) -> Option<ProgressBar> {
        self.new_counter(total, "Comparing tables")
    }

    fn new_counter(&self, total: u64, label: &str) -> Option<ProgressBar> {
        let mp = self.multi.as_ref()?;
        let bar = mp.add(ProgressBar::new(total));
        bar.set_style(counter_style());
        bar.set_prefix(label.to_string());
        Some(bar)
    }
}

fn counter_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:20} {pos:>5}/{len:<5} [{bar:50}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█ ")
}
