use crate::walker::ScanStats;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Minimum spacing between two progress events while files are searched.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    Scanning,
    Searching,
    Complete,
    Error,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPhase::Scanning => write!(f, "scanning"),
            SearchPhase::Searching => write!(f, "searching"),
            SearchPhase::Complete => write!(f, "complete"),
            SearchPhase::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: SearchPhase,
    pub processed: usize,
    pub total: usize,
    pub matched_files: usize,
    pub message: String,
}

impl ProgressEvent {
    /// Rounded completion percentage; 0 while the total is unknown.
    pub fn percentage(&self) -> u32 {
        percentage(self.processed, self.total)
    }
}

fn percentage(processed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u32
}

/// Receives progress events from a running search.
pub trait ProgressSink: Send {
    fn report(&mut self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent) + Send,
{
    fn report(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&mut self, _event: &ProgressEvent) {}
}

/// Rate limiter for progress events.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Instant,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: Instant::now(),
        }
    }

    /// True at most once per interval.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_emit) >= self.interval {
            self.last_emit = now;
            true
        } else {
            false
        }
    }
}

/// Turns walker state into the event sequence a caller sees: two scanning
/// events, throttled searching events, then one terminal event.
pub struct ProgressReporter {
    sink: Box<dyn ProgressSink>,
    throttle: ProgressThrottle,
}

impl ProgressReporter {
    pub fn new(sink: Box<dyn ProgressSink>, interval: Duration) -> Self {
        Self {
            sink,
            throttle: ProgressThrottle::new(interval),
        }
    }

    fn emit(&mut self, event: ProgressEvent) {
        self.sink.report(&event);
    }

    pub fn scanning_started(&mut self) {
        self.emit(ProgressEvent {
            phase: SearchPhase::Scanning,
            processed: 0,
            total: 0,
            matched_files: 0,
            message: "Scanning files...".to_string(),
        });
    }

    pub fn scanning_finished(&mut self, total: usize) {
        self.emit(ProgressEvent {
            phase: SearchPhase::Scanning,
            processed: 0,
            total,
            matched_files: 0,
            message: format!("Scan complete, found {total} files, starting search..."),
        });
    }

    /// Reports search progress if the throttle interval has elapsed.
    pub fn searching(&mut self, stats: &ScanStats) {
        if !self.throttle.ready() {
            return;
        }
        let (processed, total) = (stats.processed_files, stats.total_files);
        self.emit(ProgressEvent {
            phase: SearchPhase::Searching,
            processed,
            total,
            matched_files: stats.matched_files,
            message: format!(
                "Searching... {}% ({processed}/{total} files) - {} matching files",
                percentage(processed, total),
                stats.matched_files
            ),
        });
    }

    pub fn complete(&mut self, stats: &ScanStats, message: String) {
        self.emit(ProgressEvent {
            phase: SearchPhase::Complete,
            processed: stats.total_files,
            total: stats.total_files,
            matched_files: stats.matched_files,
            message,
        });
    }

    pub fn failed(&mut self, total: usize, message: String) {
        self.emit(ProgressEvent {
            phase: SearchPhase::Error,
            processed: 0,
            total,
            matched_files: 0,
            message,
        });
    }
}

/// Renders progress events on an indicatif bar.
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new(visible: bool) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta})\n{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");

        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));

        Self { bar }
    }
}

impl ProgressSink for ProgressBarSink {
    fn report(&mut self, event: &ProgressEvent) {
        self.bar.set_length(event.total as u64);
        self.bar.set_position(event.processed as u64);
        match event.phase {
            SearchPhase::Scanning | SearchPhase::Searching => {
                self.bar.set_message(event.message.clone());
            }
            SearchPhase::Complete => self.bar.finish_and_clear(),
            SearchPhase::Error => self.bar.abandon_with_message(event.message.clone()),
        }
    }
}
