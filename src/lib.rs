pub mod cli;
pub mod config;
pub mod error;
pub mod file_types;
pub mod labeler;
pub mod processor;
pub mod progress;
pub mod report;
pub mod search;
pub mod walker;

pub use crate::config::Config;
pub use crate::error::{ProjgrepError, Result};
pub use clap::Parser;
pub use cli::{Cli, Commands, ConfigAction};
pub use file_types::{ExtensionSet, FileClassifier, SearchMode, is_candidate};
pub use labeler::{PathLabeler, UNKNOWN_PROJECT, extract_label};
pub use processor::{ContentScanner, MatchLine, scan_file};
pub use progress::{ProgressBarSink, ProgressEvent, ProgressSink, SearchPhase};
pub use report::{NO_RESULTS, ReportFormat, ReportWriter, format_markdown};
pub use search::{SearchOptions, SearchRequest, SearchResult, Searcher, perform_search};
pub use walker::{MatchRecord, ScanStats, TreeWalker};
