use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::path::{normalize_separators, NormalizedPath};

pub type DataFilePath = NormalizedPath;

/// Key under which game-specific binary values are tracked. Compared exactly.
pub type GameValueKey = String;

/// Identifies one value in a settings file: file, section, key. Case-insensitive.
#[derive(Debug, Clone)]
pub struct IniEditKey {
    file: String,
    section: String,
    key: String,
    folded: (String, String, String),
}

impl IniEditKey {
    pub fn new(file: &str, section: &str, key: &str) -> Self {
        let file = normalize_separators(file);
        let section = section.trim().to_string();
        let key = key.trim().to_string();
        let folded = (file.to_lowercase(), section.to_lowercase(), key.to_lowercase());
        Self {
            file,
            section,
            key,
            folded,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for IniEditKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for IniEditKey {}

impl Hash for IniEditKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for IniEditKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IniEditKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl fmt::Display for IniEditKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.file, self.section, self.key)
    }
}
