use log::{debug, warn};
use memchr::memmem::Finder;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// A line containing the query, as it appears in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchLine {
    /// 1-based
    pub line_number: usize,
    /// Line text with surrounding whitespace trimmed
    pub content: String,
}

/// Outcome of scanning one file.
#[derive(Debug, Default)]
pub struct ScannedFile {
    pub lines: Vec<MatchLine>,
    pub bytes_read: u64,
}

/// Case-sensitive substring scanner for a single query.
pub struct ContentScanner {
    finder: Finder<'static>,
}

impl ContentScanner {
    pub fn new(query: &str) -> Self {
        Self {
            finder: Finder::new(query.as_bytes()).into_owned(),
        }
    }

    pub fn query(&self) -> &[u8] {
        self.finder.needle()
    }

    /// Reads `path` and collects the lines containing the query.
    ///
    /// Read failures are logged and produce an empty result. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn scan(&self, path: &Path) -> ScannedFile {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return ScannedFile::default();
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let lines = self.scan_text(&text);
        if !lines.is_empty() {
            debug!("{} match(es) in {}", lines.len(), path.display());
        }

        ScannedFile {
            lines,
            bytes_read: bytes.len() as u64,
        }
    }

    /// Splits `text` on line feeds and keeps every line containing the query.
    pub fn scan_text(&self, text: &str) -> Vec<MatchLine> {
        text.split('\n')
            .enumerate()
            .filter(|(_, line)| self.finder.find(line.as_bytes()).is_some())
            .map(|(i, line)| MatchLine {
                line_number: i + 1,
                content: line.trim().to_string(),
            })
            .collect()
    }
}

/// Scans a single file for `query`.
pub fn scan_file(path: &Path, query: &str) -> Vec<MatchLine> {
    ContentScanner::new(query).scan(path).lines
}
