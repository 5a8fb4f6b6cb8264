use crate::file_types::{FileClassifier, file_extension};
use crate::labeler::PathLabeler;
use crate::processor::{ContentScanner, ScannedFile};
use crate::progress::ProgressReporter;
use log::{debug, info, warn};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Candidates handed to the worker pool at once in parallel mode.
const PARALLEL_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub matched_files: usize,
    pub total_matches: usize,
    pub bytes_scanned: u64,
}

/// One matching line, enriched with where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub project: String,
    pub file_name: String,
    pub file_type: String,
    pub line_number: usize,
    pub content: String,
}

/// Records and counters produced by the scan pass.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<MatchRecord>,
    pub stats: ScanStats,
}

/// Accumulator owned by a single scan pass.
struct ScanContext<'a> {
    labeler: &'a PathLabeler,
    outcome: ScanOutcome,
}

impl<'a> ScanContext<'a> {
    fn new(labeler: &'a PathLabeler, total_files: usize) -> Self {
        Self {
            labeler,
            outcome: ScanOutcome {
                records: Vec::new(),
                stats: ScanStats {
                    total_files,
                    ..ScanStats::default()
                },
            },
        }
    }

    fn record(&mut self, path: &Path, scanned: ScannedFile) {
        let stats = &mut self.outcome.stats;
        stats.processed_files += 1;
        stats.bytes_scanned += scanned.bytes_read;

        if scanned.lines.is_empty() {
            return;
        }

        stats.matched_files += 1;
        stats.total_matches += scanned.lines.len();

        let project = self.labeler.label(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = file_extension(path);

        self.outcome
            .records
            .extend(scanned.lines.into_iter().map(|line| MatchRecord {
                project: project.clone(),
                file_name: file_name.clone(),
                file_type: file_type.clone(),
                line_number: line.line_number,
                content: line.content,
            }));
    }
}

/// Walks the search root twice: once to count candidates, once to scan them.
/// Unreadable entries are logged and skipped.
pub struct TreeWalker {
    root: PathBuf,
    classifier: FileClassifier,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>, classifier: FileClassifier) -> Self {
        Self {
            root: root.into(),
            classifier,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Calls `on_candidate` for every candidate file below the root, in
    /// depth-first order.
    pub fn walk<F>(&self, mut on_candidate: F)
    where
        F: FnMut(&Path),
    {
        let entries = WalkDir::new(&self.root).min_depth(1).follow_links(true);
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                debug!("Skipping special file: {}", entry.path().display());
                continue;
            }

            if self.classifier.is_candidate(entry.path()) {
                on_candidate(entry.path());
            } else {
                debug!("Skipping non-candidate: {}", entry.path().display());
            }
        }
    }

    /// First pass: number of candidate files, without reading any of them.
    pub fn count_candidates(&self) -> usize {
        let mut total = 0;
        self.walk(|_| total += 1);
        info!("Found {total} candidate files under {}", self.root.display());
        total
    }

    /// Second pass: scans every candidate and accumulates match records.
    ///
    /// With a worker pool, candidates are scanned in batches and merged back
    /// in walk order, so records come out in the same order as a sequential
    /// scan.
    pub fn scan(
        &self,
        scanner: &ContentScanner,
        labeler: &PathLabeler,
        total_files: usize,
        reporter: &mut ProgressReporter,
        pool: Option<&ThreadPool>,
    ) -> ScanOutcome {
        let mut ctx = ScanContext::new(labeler, total_files);

        match pool {
            None => {
                self.walk(|path| {
                    let scanned = scanner.scan(path);
                    ctx.record(path, scanned);
                    reporter.searching(&ctx.outcome.stats);
                });
            }
            Some(pool) => {
                let mut batch: Vec<PathBuf> = Vec::with_capacity(PARALLEL_BATCH_SIZE);
                self.walk(|path| {
                    batch.push(path.to_path_buf());
                    if batch.len() == PARALLEL_BATCH_SIZE {
                        scan_batch(pool, scanner, &mut batch, &mut ctx, reporter);
                    }
                });
                scan_batch(pool, scanner, &mut batch, &mut ctx, reporter);
            }
        }

        let stats = &ctx.outcome.stats;
        info!(
            "Scanned {} files, {} matched, {} matching lines",
            stats.processed_files, stats.matched_files, stats.total_matches
        );
        ctx.outcome
    }
}

fn scan_batch(
    pool: &ThreadPool,
    scanner: &ContentScanner,
    batch: &mut Vec<PathBuf>,
    ctx: &mut ScanContext<'_>,
    reporter: &mut ProgressReporter,
) {
    if batch.is_empty() {
        return;
    }
    let scanned: Vec<ScannedFile> =
        pool.install(|| batch.par_iter().map(|path| scanner.scan(path)).collect());
    for (path, file) in batch.drain(..).zip(scanned) {
        ctx.record(&path, file);
        reporter.searching(&ctx.outcome.stats);
    }
}

/// Worker pool for the scan pass; `None` means scan sequentially.
pub fn scan_pool(jobs: usize) -> Option<ThreadPool> {
    if jobs <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("projgrep-scan-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("Falling back to sequential scan, cannot start {jobs} workers: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_types::{ExtensionSet, SearchMode};
    use crate::progress::{DEFAULT_PROGRESS_INTERVAL, NullSink};
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("alpha/src")).unwrap();
        fs::create_dir_all(root.join("beta")).unwrap();
        fs::write(root.join("top.txt"), "needle at top\n").unwrap();
        fs::write(root.join("alpha/src/lib.rs"), "fn a() {}\n// needle\nneedle again\n").unwrap();
        fs::write(root.join("alpha/logo.png"), "needle hidden in image").unwrap();
        fs::write(root.join("beta/notes.md"), "nothing here\n").unwrap();
        dir
    }

    fn walker(root: &Path, mode: SearchMode, exts: &str) -> TreeWalker {
        TreeWalker::new(
            root,
            FileClassifier::new(mode, ExtensionSet::parse_csv(exts)),
        )
    }

    fn run_scan(walker: &TreeWalker, pool: Option<&ThreadPool>) -> ScanOutcome {
        let total = walker.count_candidates();
        let mut reporter = ProgressReporter::new(Box::new(NullSink), DEFAULT_PROGRESS_INTERVAL);
        walker.scan(
            &ContentScanner::new("needle"),
            &PathLabeler::new(walker.root()),
            total,
            &mut reporter,
            pool,
        )
    }

    #[test]
    fn test_count_skips_binary_extensions() {
        let dir = fixture();
        let walker = walker(dir.path(), SearchMode::AllText, "");
        assert_eq!(walker.count_candidates(), 3);
    }

    #[test]
    fn test_scan_accumulates_records_per_line() {
        let dir = fixture();
        let walker = walker(dir.path(), SearchMode::AllText, "");
        let outcome = run_scan(&walker, None);

        assert_eq!(outcome.stats.total_files, 3);
        assert_eq!(outcome.stats.processed_files, 3);
        assert_eq!(outcome.stats.matched_files, 2);
        assert_eq!(outcome.stats.total_matches, 3);

        let lib_records: Vec<_> = outcome
            .records
            .iter()
            .filter(|r| r.file_name == "lib.rs")
            .collect();
        assert_eq!(lib_records.len(), 2);
        assert_eq!(lib_records[0].project, "alpha");
        assert_eq!(lib_records[0].file_type, ".rs");
        assert_eq!(lib_records[0].line_number, 2);
        assert_eq!(lib_records[1].line_number, 3);

        let top = outcome.records.iter().find(|r| r.file_name == "top.txt").unwrap();
        assert_eq!(top.project, "unknown");
    }

    #[test]
    fn test_custom_extensions_restrict_scan() {
        let dir = fixture();
        let walker = walker(dir.path(), SearchMode::CustomExtensions, "md,png");
        let outcome = run_scan(&walker, None);
        assert_eq!(outcome.stats.total_files, 2);
        assert_eq!(outcome.stats.matched_files, 1);
        assert_eq!(outcome.records[0].file_name, "logo.png");
    }

    #[test]
    fn test_parallel_scan_matches_sequential_order() {
        let dir = TempDir::new().unwrap();
        for i in 0..150 {
            let sub = dir.path().join(format!("p{}", i % 7));
            fs::create_dir_all(&sub).unwrap();
            fs::write(sub.join(format!("f{i}.txt")), format!("x\nneedle {i}\ny\nneedle")).unwrap();
        }
        let walker = walker(dir.path(), SearchMode::AllText, "");

        let sequential = run_scan(&walker, None);
        let pool = scan_pool(4).unwrap();
        let parallel = run_scan(&walker, Some(&pool));

        assert_eq!(sequential.stats, parallel.stats);
        assert_eq!(sequential.records, parallel.records);
        assert_eq!(parallel.stats.total_matches, 300);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let walker = walker(&dir.path().join("gone"), SearchMode::AllText, "");
        assert_eq!(walker.count_candidates(), 0);
        let outcome = run_scan(&walker, None);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats, ScanStats::default());
    }

    #[test]
    fn test_single_job_means_sequential() {
        assert!(scan_pool(0).is_none());
        assert!(scan_pool(1).is_none());
    }
}
