use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

/// Extensions never scanned in [`SearchMode::AllText`].
pub const BINARY_EXTENSIONS: &[&str] = &[
    // Images
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg",
    // Video
    ".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".webm",
    // Audio
    ".mp3", ".wav", ".aac", ".ogg", ".flac",
    // Archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz",
    // Executables and disk images
    ".class", ".exe", ".dll", ".so", ".bin", ".dat", ".apk", ".iso",
    // Office documents
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx",
];

/// Which files a search considers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum SearchMode {
    /// Every file whose extension is not on the binary denylist
    #[default]
    #[serde(rename = "all")]
    #[value(name = "all")]
    AllText,
    /// Only files whose extension is in the caller's list
    #[serde(rename = "custom")]
    #[value(name = "custom")]
    CustomExtensions,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::AllText => write!(f, "all"),
            SearchMode::CustomExtensions => write!(f, "custom"),
        }
    }
}

/// Normalized, deduplicated set of extensions in `.ext` form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: BTreeSet<String>,
}

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list such as `"rs, .TOML,md"`.
    pub fn parse_csv(raw: &str) -> Self {
        raw.split(',').collect()
    }

    /// Trims, lower-cases and dot-prefixes a single extension.
    ///
    /// Returns `None` for entries that are empty once normalized.
    pub fn normalize(raw: &str) -> Option<String> {
        let trimmed = raw.trim().to_lowercase();
        let bare = trimmed.strip_prefix('.').unwrap_or(&trimmed);
        if bare.is_empty() {
            return None;
        }
        Some(format!(".{bare}"))
    }

    pub fn insert(&mut self, raw: &str) -> bool {
        match Self::normalize(raw) {
            Some(ext) => self.extensions.insert(ext),
            None => false,
        }
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.extensions.contains(ext)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for raw in iter {
            set.insert(raw.as_ref());
        }
        set
    }
}

impl fmt::Display for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(","))
    }
}

/// Extension of `path` with its leading dot, case preserved, or `""`.
pub fn file_extension(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy()),
        _ => String::new(),
    }
}

/// Classifier bound to one search's mode and extension list.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    mode: SearchMode,
    extensions: ExtensionSet,
    denylist: HashSet<&'static str>,
}

impl FileClassifier {
    pub fn new(mode: SearchMode, extensions: ExtensionSet) -> Self {
        Self {
            mode,
            extensions,
            denylist: BINARY_EXTENSIONS.iter().copied().collect(),
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Whether `path` should be scanned. Looks at the extension only.
    pub fn is_candidate(&self, path: &Path) -> bool {
        let ext = file_extension(path).to_lowercase();
        match self.mode {
            SearchMode::AllText => !self.denylist.contains(ext.as_str()),
            SearchMode::CustomExtensions => !ext.is_empty() && self.extensions.contains(&ext),
        }
    }
}

/// Stateless form of [`FileClassifier::is_candidate`].
pub fn is_candidate(path: &Path, mode: SearchMode, extensions: &ExtensionSet) -> bool {
    FileClassifier::new(mode, extensions.clone()).is_candidate(path)
}
