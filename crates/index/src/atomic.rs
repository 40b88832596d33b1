use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;

/// Serialises `value` as pretty JSON with a trailing newline and moves it
/// into place with a rename, so readers never observe a half-written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialise {}", path.display()))?;
    buf.push(b'\n');
    write_bytes_atomic(path, &buf)
}

pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("failed to move output into {}", path.display()))?;
    Ok(())
}

/// A directory built next to its final location and swapped in on commit.
/// An uncommitted staging directory is removed on drop.
#[derive(Debug)]
pub struct StagedDir {
    target: PathBuf,
    staging: PathBuf,
    committed: bool,
}

impl StagedDir {
    pub fn create(target: &Path) -> Result<Self> {
        let staging = sibling(target, "staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("failed to clear {}", staging.display()))?;
        }
        fs::create_dir_all(&staging)
            .with_context(|| format!("failed to create {}", staging.display()))?;
        Ok(Self {
            target: target.to_path_buf(),
            staging,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.staging
    }

    pub fn commit(mut self) -> Result<()> {
        let previous = sibling(&self.target, "previous");
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        if self.target.exists() {
            fs::rename(&self.target, &previous).with_context(|| {
                format!("failed to move aside {}", self.target.display())
            })?;
        }
        fs::rename(&self.staging, &self.target)
            .with_context(|| format!("failed to swap in {}", self.target.display()))?;
        self.committed = true;
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        Ok(())
    }
}

impl Drop for StagedDir {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            if let Err(err) = fs::remove_dir_all(&self.staging) {
                tracing::warn!(
                    "failed to remove staging dir {}: {err}",
                    self.staging.display()
                );
            }
        }
    }
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!(".{name}.{suffix}"))
}
