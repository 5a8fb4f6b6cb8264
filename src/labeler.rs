use log::warn;
use regex::Regex;
use std::path::Path;

pub const UNKNOWN_PROJECT: &str = "unknown";

/// Derives project labels for files under one search root.
#[derive(Debug, Clone)]
pub struct PathLabeler {
    pattern: Option<Regex>,
}

impl PathLabeler {
    pub fn new(root: &Path) -> Self {
        let root = normalize_separators(root);
        let root = root.trim_end_matches('/');
        let pattern = match Regex::new(&format!("^{}/(.*?)/", regex::escape(root))) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Cannot build project pattern for root '{root}': {e}");
                None
            }
        };
        Self { pattern }
    }

    /// Label for `path`, or [`UNKNOWN_PROJECT`] when the file is not nested at
    /// least two levels below the root.
    pub fn label(&self, path: &Path) -> String {
        let Some(pattern) = &self.pattern else {
            return UNKNOWN_PROJECT.to_string();
        };
        let path = normalize_separators(path);
        pattern
            .captures(&path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_PROJECT.to_string())
    }
}

fn normalize_separators(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// One-shot form of [`PathLabeler::label`].
pub fn extract_label(path: &Path, root: &Path) -> String {
    PathLabeler::new(root).label(path)
}
