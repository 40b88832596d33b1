use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use refforge_index::{read_json, OutputLayout, VersionRecord};

use crate::error::Result;
use crate::sources::SourceLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReason {
    Forced,
    MissingOutput(PathBuf),
    NoBuildRecord,
    SourceNewer(PathBuf),
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReason::Forced => f.write_str("forced rebuild"),
            RunReason::MissingOutput(path) => write!(f, "output {} is missing", path.display()),
            RunReason::NoBuildRecord => f.write_str("previous build record is unreadable"),
            RunReason::SourceNewer(path) => {
                write!(f, "{} changed since the last build", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Run(RunReason),
    Skip { built_at: DateTime<Utc> },
}

impl GateDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, GateDecision::Run(_))
    }
}

/// Skip iff every declared output exists and no gated source is newer than
/// the recorded build time. `force` always runs.
pub fn check(sources: &SourceLayout, layout: &OutputLayout, force: bool) -> Result<GateDecision> {
    if force {
        return Ok(GateDecision::Run(RunReason::Forced));
    }
    if let Some(missing) = layout.declared_outputs().into_iter().find(|p| !p.exists()) {
        return Ok(GateDecision::Run(RunReason::MissingOutput(missing)));
    }
    let record: VersionRecord = match read_json(&layout.version()) {
        Ok(record) => record,
        Err(err) => {
            tracing::debug!(stage = "gate", "cannot read build record: {err:#}");
            return Ok(GateDecision::Run(RunReason::NoBuildRecord));
        }
    };
    if let Some((path, modified)) = sources.newest_mtime()? {
        if modified > record.built_at {
            return Ok(GateDecision::Run(RunReason::SourceNewer(path)));
        }
    }
    Ok(GateDecision::Skip {
        built_at: record.built_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use refforge_index::write_json_atomic;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    fn complete_outputs(layout: &OutputLayout, built_at: DateTime<Utc>) {
        for path in layout.declared_outputs() {
            if path.extension().is_some() {
                write_json_atomic(&path, &serde_json::json!([])).unwrap();
            } else {
                fs::create_dir_all(&path).unwrap();
            }
        }
        let record = VersionRecord {
            version: "1".into(),
            built_at,
            source_fingerprint: String::new(),
            generator: "test".into(),
            counts: BTreeMap::new(),
        };
        write_json_atomic(&layout.version(), &record).unwrap();
    }

    fn sources(root: &std::path::Path) -> SourceLayout {
        let sources = SourceLayout::new(root.join("data"));
        fs::create_dir_all(sources.templates_dir()).unwrap();
        fs::write(sources.templates_dir().join("master.xml"), "<ItemFilter/>").unwrap();
        sources
    }

    #[test]
    fn skips_when_outputs_complete_and_sources_older() {
        let dir = tempdir().unwrap();
        let sources = sources(dir.path());
        let layout = OutputLayout::new(dir.path().join("database"));
        complete_outputs(&layout, Utc::now() + Duration::hours(1));
        assert!(matches!(
            check(&sources, &layout, false).unwrap(),
            GateDecision::Skip { .. }
        ));
        assert_eq!(
            check(&sources, &layout, true).unwrap(),
            GateDecision::Run(RunReason::Forced)
        );
    }

    #[test]
    fn runs_when_a_source_is_newer() {
        let dir = tempdir().unwrap();
        let sources = sources(dir.path());
        let layout = OutputLayout::new(dir.path().join("database"));
        complete_outputs(&layout, Utc::now() - Duration::hours(1));
        assert!(matches!(
            check(&sources, &layout, false).unwrap(),
            GateDecision::Run(RunReason::SourceNewer(_))
        ));
    }

    #[test]
    fn runs_when_an_output_is_missing() {
        let dir = tempdir().unwrap();
        let sources = sources(dir.path());
        let layout = OutputLayout::new(dir.path().join("database"));
        complete_outputs(&layout, Utc::now() + Duration::hours(1));
        fs::remove_file(layout.tags()).unwrap();
        assert_eq!(
            check(&sources, &layout, false).unwrap(),
            GateDecision::Run(RunReason::MissingOutput(layout.tags()))
        );
    }

    #[test]
    fn runs_when_build_record_is_corrupt() {
        let dir = tempdir().unwrap();
        let sources = sources(dir.path());
        let layout = OutputLayout::new(dir.path().join("database"));
        complete_outputs(&layout, Utc::now() + Duration::hours(1));
        fs::write(layout.version(), "not json").unwrap();
        assert_eq!(
            check(&sources, &layout, false).unwrap(),
            GateDecision::Run(RunReason::NoBuildRecord)
        );
    }
}
