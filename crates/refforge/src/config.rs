use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use refforge_core::{default_markers, BuildRequest, SourceLayout};
use refforge_index::OutputLayout;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "refforge.yaml";
pub const DEFAULT_VERSION: &str = "0.0.0-dev";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub sources: PathBuf,
    pub output: PathBuf,
    pub version: Option<String>,
    pub suspicious_markers: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("data"),
            output: PathBuf::from("database"),
            version: None,
            suspicious_markers: default_markers(),
        }
    }
}

impl RunConfig {
    /// Explicit path must exist; otherwise `refforge.yaml` is read when
    /// present. Environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        Ok(cfg.with_env(|key| env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yaml::from_str(&raw).context("invalid refforge config")
    }

    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(sources) = lookup("REFFORGE_SOURCES") {
            self.sources = PathBuf::from(sources);
        }
        if let Some(output) = lookup("REFFORGE_OUTPUT") {
            self.output = PathBuf::from(output);
        }
        if let Some(version) = lookup("REFFORGE_VERSION") {
            self.version = Some(version);
        }
        self
    }

    pub fn with_cli(mut self, sources: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        if let Some(sources) = sources {
            self.sources = sources;
        }
        if let Some(output) = output {
            self.output = output;
        }
        self
    }

    pub fn source_layout(&self) -> SourceLayout {
        SourceLayout::new(&self.sources)
    }

    pub fn output_layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output)
    }

    /// `--stamp` wins over the configured version.
    pub fn request(&self, stamp: Option<String>) -> BuildRequest {
        BuildRequest {
            sources: self.source_layout(),
            layout: self.output_layout(),
            version: stamp
                .or_else(|| self.version.clone())
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            suspicious_markers: self.suspicious_markers.clone(),
        }
    }
}
