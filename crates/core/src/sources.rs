use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::Result;
use crate::model::Category;

pub const TEMPLATES_DIR: &str = "templates";
pub const WEB_DIR: &str = "web";
pub const OVERRIDES_DIR: &str = "overrides";
pub const ANALYTICS_FILE: &str = "analytics/unique_analytics.json";

/// Where every input of a build lives, relative to one source root.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    root: PathBuf,
}

impl SourceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    pub fn web_dir(&self) -> PathBuf {
        self.root.join(WEB_DIR)
    }

    pub fn web_category_dir(&self, category: Category) -> PathBuf {
        self.web_dir().join(category.plural())
    }

    pub fn overrides_dir(&self) -> PathBuf {
        self.root.join(OVERRIDES_DIR)
    }

    pub fn override_file(&self, category: Category) -> PathBuf {
        self.overrides_dir().join(format!("{}.json", category.plural()))
    }

    pub fn analytics_file(&self) -> PathBuf {
        self.root.join(ANALYTICS_FILE)
    }

    /// Every file that feeds the output, sorted.
    pub fn gated_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for dir in [self.templates_dir(), self.overrides_dir(), self.web_dir()] {
            if !dir.exists() {
                continue;
            }
            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        }
        let analytics = self.analytics_file();
        if analytics.is_file() {
            files.push(analytics);
        }
        files.sort();
        Ok(files)
    }

    /// The most recently modified gated file and its mtime.
    pub fn newest_mtime(&self) -> Result<Option<(PathBuf, DateTime<Utc>)>> {
        let mut newest: Option<(PathBuf, DateTime<Utc>)> = None;
        for path in self.gated_files()? {
            let modified: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();
            if newest.as_ref().map_or(true, |(_, seen)| modified > *seen) {
                newest = Some((path, modified));
            }
        }
        Ok(newest)
    }

    /// blake3 over relative path and content of every gated file.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        for path in self.gated_files()? {
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
            hasher.update(b"\0");
            hasher.update(&fs::read(&path)?);
            hasher.update(b"\0");
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}
