use crate::config::Config;
use crate::error::{ProjgrepError, Result};
use crate::file_types::{ExtensionSet, FileClassifier, SearchMode};
use crate::labeler::PathLabeler;
use crate::processor::ContentScanner;
use crate::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressReporter, ProgressSink};
use crate::report::{ReportFormat, ReportWriter};
use crate::walker::{MatchRecord, ScanOutcome, ScanStats, TreeWalker, scan_pool};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A validated search: what to look for, where, and in which files.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    mode: SearchMode,
    extensions: ExtensionSet,
    root: PathBuf,
}

impl SearchRequest {
    /// Fails with [`ProjgrepError::InvalidQuery`] when `query` is blank.
    pub fn new(
        query: impl Into<String>,
        mode: SearchMode,
        extensions: ExtensionSet,
        root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ProjgrepError::InvalidQuery);
        }
        Ok(Self {
            query,
            mode,
            extensions,
            root: root.into(),
        })
    }

    /// Same as [`SearchRequest::new`] with extensions given as `"rs,.md, toml"`.
    pub fn from_csv(
        query: impl Into<String>,
        mode: SearchMode,
        extensions_csv: &str,
        root: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::new(query, mode, ExtensionSet::parse_csv(extensions_csv), root)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Terminal value of a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub success: bool,
    pub message: String,
    pub records: Vec<MatchRecord>,
    pub stats: ScanStats,
    pub saved_path: Option<PathBuf>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub output_dir: PathBuf,
    pub format: ReportFormat,
    /// Scan workers; 1 or less scans sequentially
    pub jobs: usize,
    pub progress_interval: Duration,
}

impl SearchOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: ReportFormat::Markdown,
            jobs: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.report.output_dir.clone(),
            format: config.report.format,
            jobs: config.performance.resolved_jobs(),
            progress_interval: Duration::from_millis(config.performance.progress_interval_ms),
        }
    }
}

type SharedReporter = Arc<Mutex<ProgressReporter>>;

/// Runs searches. Each call owns its counters and records; concurrent calls
/// share nothing.
#[derive(Debug, Clone)]
pub struct Searcher {
    options: SearchOptions,
}

impl Searcher {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Runs `request` to completion without blocking the calling task.
    ///
    /// Always ends with exactly one `Complete` or `Error` progress event.
    pub async fn perform_search<S>(&self, request: SearchRequest, sink: S) -> SearchResult
    where
        S: ProgressSink + 'static,
    {
        tokio::task::yield_now().await;

        let start = Instant::now();
        let reporter = self.reporter(sink);
        let walker = Arc::new(walker_for(&request));
        info!(
            "Searching for {:?} under {} ({} mode)",
            request.query,
            request.root.display(),
            request.mode
        );

        let total = {
            let walker = Arc::clone(&walker);
            let reporter = Arc::clone(&reporter);
            match tokio::task::spawn_blocking(move || count_phase(&walker, &reporter)).await {
                Ok(total) => total,
                Err(e) => {
                    warn!("File count aborted, continuing without a total: {e}");
                    0
                }
            }
        };

        tokio::task::yield_now().await;

        let scanned = {
            let walker = Arc::clone(&walker);
            let reporter = Arc::clone(&reporter);
            let request = request.clone();
            let options = self.options.clone();
            tokio::task::spawn_blocking(move || {
                scan_phase(&walker, &request, &options, total, &reporter)
            })
            .await
        };

        match scanned {
            Ok((outcome, saved)) => finish(&request, outcome, saved, &reporter, start),
            Err(e) => fail(
                ScanStats {
                    total_files: total,
                    ..ScanStats::default()
                },
                ProjgrepError::Task(e.to_string()),
                &reporter,
                start,
            ),
        }
    }

    /// Synchronous form of [`Searcher::perform_search`] for callers without
    /// an async runtime.
    pub fn run_blocking<S>(&self, request: SearchRequest, sink: S) -> SearchResult
    where
        S: ProgressSink + 'static,
    {
        let start = Instant::now();
        let reporter = self.reporter(sink);
        let walker = walker_for(&request);

        let total = count_phase(&walker, &reporter);
        let (outcome, saved) = scan_phase(&walker, &request, &self.options, total, &reporter);
        finish(&request, outcome, saved, &reporter, start)
    }

    fn reporter<S: ProgressSink + 'static>(&self, sink: S) -> SharedReporter {
        Arc::new(Mutex::new(ProgressReporter::new(
            Box::new(sink),
            self.options.progress_interval,
        )))
    }
}

fn walker_for(request: &SearchRequest) -> TreeWalker {
    TreeWalker::new(
        request.root.clone(),
        FileClassifier::new(request.mode, request.extensions.clone()),
    )
}

fn count_phase(walker: &TreeWalker, reporter: &SharedReporter) -> usize {
    reporter.lock().scanning_started();
    let total = walker.count_candidates();
    reporter.lock().scanning_finished(total);
    total
}

fn scan_phase(
    walker: &TreeWalker,
    request: &SearchRequest,
    options: &SearchOptions,
    total: usize,
    reporter: &SharedReporter,
) -> (ScanOutcome, Result<PathBuf>) {
    let scanner = ContentScanner::new(&request.query);
    let labeler = PathLabeler::new(&request.root);
    let pool = scan_pool(options.jobs);

    let outcome = {
        let mut reporter = reporter.lock();
        walker.scan(&scanner, &labeler, total, &mut reporter, pool.as_ref())
    };

    let saved =
        ReportWriter::new(&options.output_dir, options.format).write(&outcome.records, &request.query);
    (outcome, saved)
}

fn finish(
    request: &SearchRequest,
    outcome: ScanOutcome,
    saved: Result<PathBuf>,
    reporter: &SharedReporter,
    start: Instant,
) -> SearchResult {
    let ScanOutcome { records, stats } = outcome;
    let saved_path = match saved {
        Ok(path) => path,
        Err(e) => return fail(stats, e, reporter, start),
    };

    let message = format!(
        "Search complete! Searched {} files, found {} matching files, {} matching lines. Results saved to: {}",
        stats.total_files,
        stats.matched_files,
        records.len(),
        saved_path.display()
    );
    info!("{message}");
    reporter.lock().complete(&stats, message.clone());
    info!("Search for {:?} took {:.2?}", request.query, start.elapsed());

    SearchResult {
        success: true,
        message,
        records,
        stats,
        saved_path: Some(saved_path),
        elapsed: start.elapsed(),
    }
}

/// Failed searches keep their counters but drop every collected record.
fn fail(
    mut stats: ScanStats,
    err: ProjgrepError,
    reporter: &SharedReporter,
    start: Instant,
) -> SearchResult {
    let message = format!("Search failed: {err}");
    error!("{message}");
    stats.total_matches = 0;
    reporter.lock().failed(stats.total_files, message.clone());

    SearchResult {
        success: false,
        message,
        records: Vec::new(),
        stats,
        saved_path: None,
        elapsed: start.elapsed(),
    }
}

/// Runs one search with the root and report settings read from `config`.
///
/// Only a blank query is an error; everything that happens during the search
/// is reported through the returned [`SearchResult`].
pub async fn perform_search<S>(
    config: &Config,
    query: &str,
    mode: SearchMode,
    extensions_csv: &str,
    sink: S,
) -> Result<SearchResult>
where
    S: ProgressSink + 'static,
{
    let request = SearchRequest::from_csv(
        query,
        mode,
        extensions_csv,
        config.search.search_path.clone(),
    )?;
    let searcher = Searcher::new(SearchOptions::from_config(config));
    Ok(searcher.perform_search(request, sink).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullSink, ProgressEvent, SearchPhase};
    use crate::report::NO_RESULTS;
    use std::fs;
    use tempfile::TempDir;

    fn options(out: &Path) -> SearchOptions {
        SearchOptions {
            progress_interval: Duration::ZERO,
            ..SearchOptions::new(out)
        }
    }

    #[test]
    fn test_blank_query_is_rejected() {
        let err = SearchRequest::from_csv("  ", SearchMode::AllText, "", "/tmp").unwrap_err();
        assert!(matches!(err, ProjgrepError::InvalidQuery));
    }

    #[test]
    fn test_request_normalizes_extensions() {
        let request =
            SearchRequest::from_csv("q", SearchMode::CustomExtensions, "CSV, .txt,", "/tmp")
                .unwrap();
        assert_eq!(request.extensions().to_string(), ".csv,.txt");
    }

    #[test]
    fn test_run_blocking_without_runtime() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("proj")).unwrap();
        fs::write(root.path().join("proj/a.txt"), "find me\n").unwrap();

        let request =
            SearchRequest::new("find", SearchMode::AllText, ExtensionSet::new(), root.path())
                .unwrap();
        let result = Searcher::new(options(out.path())).run_blocking(request, NullSink);

        assert!(result.success);
        assert_eq!(result.stats.total_matches, 1);
        assert_eq!(result.records[0].project, "proj");
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(root.path().join(format!("{i}.txt")), "hit\n").unwrap();
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let request =
            SearchRequest::new("hit", SearchMode::AllText, ExtensionSet::new(), root.path())
                .unwrap();
        let result = Searcher::new(options(out.path()))
            .perform_search(request, move |event: &ProgressEvent| {
                sink_events.lock().push(event.clone())
            })
            .await;
        assert!(result.success);

        let events = events.lock();
        assert_eq!(events[0].phase, SearchPhase::Scanning);
        assert_eq!(events[0].total, 0);
        assert_eq!(events[1].phase, SearchPhase::Scanning);
        assert_eq!(events[1].total, 5);

        let last = events.last().unwrap();
        assert_eq!(last.phase, SearchPhase::Complete);
        assert_eq!((last.processed, last.total, last.matched_files), (5, 5, 5));

        let terminal = events
            .iter()
            .filter(|e| matches!(e.phase, SearchPhase::Complete | SearchPhase::Error))
            .count();
        assert_eq!(terminal, 1);

        let searching: Vec<usize> = events
            .iter()
            .filter(|e| e.phase == SearchPhase::Searching)
            .map(|e| e.processed)
            .collect();
        assert!(searching.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_persistence_failure_discards_records() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello\n").unwrap();
        let blocker = out.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let request =
            SearchRequest::new("hello", SearchMode::AllText, ExtensionSet::new(), root.path())
                .unwrap();
        let result = Searcher::new(options(&blocker.join("reports")))
            .perform_search(request, move |event: &ProgressEvent| {
                sink_events.lock().push(event.clone())
            })
            .await;

        assert!(!result.success);
        assert!(result.records.is_empty());
        assert!(result.saved_path.is_none());
        assert_eq!(result.stats.total_files, 1);
        assert_eq!(result.stats.total_matches, 0);
        assert!(result.message.starts_with("Search failed"));

        let events = events.lock();
        assert_eq!(events.last().unwrap().phase, SearchPhase::Error);
    }

    #[tokio::test]
    async fn test_config_driven_search_writes_sentinel() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "nothing\n").unwrap();

        let mut config = Config::default();
        config.search.search_path = root.path().to_path_buf();
        config.report.output_dir = out.path().to_path_buf();

        let result = perform_search(&config, "absent", SearchMode::AllText, "", NullSink)
            .await
            .unwrap();
        assert!(result.success);
        let saved = result.saved_path.unwrap();
        assert_eq!(fs::read_to_string(saved).unwrap(), NO_RESULTS);
    }
}
