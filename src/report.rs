use crate::error::{ProjgrepError, Result};
use crate::walker::MatchRecord;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Body of a Markdown report with no matches.
pub const NO_RESULTS: &str = "No matching results found.";

const MAX_QUERY_BYTES_IN_FILE_NAME: usize = 128;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }

    pub fn render(&self, records: &[MatchRecord]) -> Result<String> {
        match self {
            ReportFormat::Markdown => Ok(format_markdown(records)),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

/// Renders records as a Markdown table, one row per record.
pub fn format_markdown(records: &[MatchRecord]) -> String {
    if records.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut output = String::new();
    output.push_str("| Project | File Name | File Type | Line | Content |\n");
    output.push_str("| ------- | --------- | --------- | ---- | ------- |\n");

    for r in records {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(&r.project),
            escape_cell(&r.file_name),
            escape_cell(&r.file_type),
            r.line_number,
            escape_cell(&r.content)
        ));
    }

    output
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// `search_results_<query>_<timestamp>.<ext>` with a filesystem-safe query.
pub fn report_file_name(query: &str, timestamp: &str, format: ReportFormat) -> String {
    let mut safe_query = String::new();
    for c in query.chars() {
        let c = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        // Name length limits are in bytes; never split a char.
        if safe_query.len() + c.len_utf8() > MAX_QUERY_BYTES_IN_FILE_NAME {
            break;
        }
        safe_query.push(c);
    }
    format!(
        "search_results_{safe_query}_{timestamp}.{}",
        format.extension()
    )
}

/// Current UTC time as ISO-8601 with `:` and `.` replaced by `-`.
pub fn file_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-")
}

/// Writes rendered reports into one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Renders and persists `records`, returning the absolute report path.
    pub fn write(&self, records: &[MatchRecord], query: &str) -> Result<PathBuf> {
        let content = self.format.render(records)?;
        self.save(&content, query)
    }

    /// Persists already-rendered content.
    ///
    /// The file appears at its final path complete or not at all.
    pub fn save(&self, content: &str, query: &str) -> Result<PathBuf> {
        let persistence = |path: &Path, source: io::Error| {
            error!("Failed to write report {}: {}", path.display(), source);
            ProjgrepError::Persistence {
                path: path.to_path_buf(),
                source,
            }
        };

        fs::create_dir_all(&self.output_dir).map_err(|e| persistence(&self.output_dir, e))?;
        let dir = self
            .output_dir
            .canonicalize()
            .map_err(|e| persistence(&self.output_dir, e))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| persistence(&dir, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| persistence(tmp.path(), e))?;

        let file_name = report_file_name(query, &file_timestamp(), self.format);
        let mut target = dir.join(&file_name);
        let mut attempt = 1;
        loop {
            match tmp.persist_noclobber(&target) {
                Ok(_) => break,
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists && attempt < 100 => {
                    tmp = e.file;
                    let stem = file_name.trim_end_matches(&format!(".{}", self.format.extension()));
                    target = dir.join(format!("{stem}-{attempt}.{}", self.format.extension()));
                    attempt += 1;
                }
                Err(e) => return Err(persistence(&target, e.error)),
            }
        }

        debug!("Report written to {}", target.display());
        Ok(target)
    }
}
