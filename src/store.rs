//! Paper store persisted as a semicolon-delimited CSV file.
//!
//! Layout: header `doi;title;date;keywords`, one row per paper. The keywords
//! cell holds a JSON array of strings. Files written by earlier tooling hold a
//! Python-style list (`['aging', 'senescence']`) instead; both are read.

use crate::error::Result;
use crate::medline::PaperRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default store location
pub const DEFAULT_STORE_PATH: &str = "./data/processed/papers.csv";

/// Column separator of the store file
const DELIMITER: u8 = b';';

/// One CSV row; keywords are kept serialized in a single cell
#[derive(Debug, Serialize, Deserialize)]
struct StoredPaper {
    doi: String,
    title: String,
    date: String,
    #[serde(default)]
    keywords: String,
}

impl StoredPaper {
    fn from_record(record: &PaperRecord) -> Result<Self> {
        Ok(Self {
            doi: record.doi.clone(),
            title: record.title.clone(),
            date: record.date.clone(),
            keywords: serde_json::to_string(&record.keywords)?,
        })
    }

    fn into_record(self) -> PaperRecord {
        let keywords = parse_keyword_cell(&self.keywords);
        PaperRecord {
            doi: self.doi,
            title: self.title,
            date: self.date,
            keywords,
        }
    }
}

/// In-memory copy of the persisted paper collection
#[derive(Debug)]
pub struct PaperStore {
    path: PathBuf,
    records: Vec<PaperRecord>,
}

impl PaperStore {
    /// Empty store bound to `path`; nothing is read
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Load the store, falling back to an empty one.
    ///
    /// A missing or unreadable file is the normal first-run state, so it is
    /// only reported as a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = ?path, error = %e, "There are no papers stored, starting empty");
                Self::new(path)
            }
        }
    }

    /// Load the store from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or is not a well-formed
    /// `doi;title;date;keywords` table. Keyword cells never fail a load.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .from_path(path)?;

        let mut records = Vec::new();
        for row in reader.deserialize::<StoredPaper>() {
            records.push(row?.into_record());
        }

        info!(count = records.len(), path = ?path, "Loaded paper store");
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Store file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[PaperRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// DOIs of every stored paper
    pub fn dois(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.doi.clone()).collect()
    }

    /// Append records after the existing ones, keeping their order.
    pub fn append(&mut self, records: impl IntoIterator<Item = PaperRecord>) {
        self.records.extend(records);
    }

    /// Rewrite the whole file, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .from_path(&self.path)?;

        for record in &self.records {
            wtr.serialize(StoredPaper::from_record(record)?)?;
        }

        wtr.flush()?;
        debug!(count = self.records.len(), path = ?self.path, "Saved paper store");
        Ok(())
    }
}

/// Parse a serialized keyword list.
///
/// Accepts a JSON array, a Python-style list literal, or an empty cell. Any
/// other content is kept verbatim as a single keyword so the row survives.
fn parse_keyword_cell(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Vec::new();
    }

    if let Ok(keywords) = serde_json::from_str::<Vec<String>>(cell) {
        return keywords;
    }

    parse_python_list(cell).unwrap_or_else(|| {
        warn!(cell = cell, "Keywords cell is not a list, keeping it as one keyword");
        vec![cell.to_string()]
    })
}

/// Parse a list literal such as `['aging', "Alzheimer's disease"]`.
fn parse_python_list(cell: &str) -> Option<Vec<String>> {
    let inner = cell.strip_prefix('[')?.strip_suffix(']')?;

    let item_regex = Regex::new(r#"'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)""#).ok()?;

    Some(
        item_regex
            .captures_iter(inner)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| unescape(m.as_str()))
            .collect(),
    )
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
