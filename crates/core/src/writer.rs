use std::collections::BTreeMap;
use std::fs;

use chrono::{DateTime, Utc};
use refforge_index::{
    class_slug, write_bytes_atomic, write_json_atomic, EntityRecord, OutputLayout, Partition,
    StagedDir, UniqueOverviewRecord, VersionRecord,
};

use crate::error::Result;
use crate::model::{Dataset, Scope};
use crate::stats::{BuildStats, Stage};
use crate::validate::ValidationReport;

pub const GENERATOR: &str = concat!("refforge ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub version: String,
    pub built_at: DateTime<Utc>,
    pub source_fingerprint: String,
}

/// Writes every database file under `layout` except `version.json`, which
/// is dropped first and only comes back through [`write_version`] once the
/// indexes are in place.
pub fn write_database(
    dataset: &Dataset,
    report: &ValidationReport,
    layout: &OutputLayout,
    options: &WriteOptions,
    stats: &mut BuildStats,
) -> Result<VersionRecord> {
    let version_path = layout.version();
    if version_path.exists() {
        fs::remove_file(&version_path)?;
    }
    write_json_atomic(&layout.reference(), &dataset.reference)?;
    let tags: Vec<&String> = dataset.tags.iter().collect();
    write_json_atomic(&layout.tags(), &tags)?;
    stats.add_ok(Stage::Write);

    for scope in Scope::all() {
        let records: Vec<EntityRecord> = dataset.entities(scope).map(|e| e.to_record()).collect();
        match scope.partition() {
            Partition::Skill => write_skills(layout, &records)?,
            Partition::Unique => {
                let overview: Vec<UniqueOverviewRecord> =
                    records.iter().map(UniqueOverviewRecord::from_entity).collect();
                if let Some(path) = layout.partition_file(Partition::Unique) {
                    write_json_atomic(&path, &overview)?;
                }
            }
            partition => {
                if let Some(path) = layout.partition_file(partition) {
                    write_json_atomic(&path, &records)?;
                }
            }
        }
        stats.add_ok(Stage::Write);
    }

    write_json_atomic(&layout.validation_report(), report)?;
    write_bytes_atomic(&layout.validation_report_md(), report.render_markdown().as_bytes())?;

    let version = VersionRecord {
        version: options.version.clone(),
        built_at: options.built_at,
        source_fingerprint: options.source_fingerprint.clone(),
        generator: GENERATOR.to_string(),
        counts: dataset.counts(),
    };
    stats.add_ok(Stage::Write);
    Ok(version)
}

/// Marks the build as complete.
pub fn write_version(layout: &OutputLayout, version: &VersionRecord) -> Result<()> {
    write_json_atomic(&layout.version(), version)?;
    tracing::info!(
        stage = "write",
        "database {} written to {}",
        version.version,
        layout.root().display()
    );
    Ok(())
}

/// One file per skill class, from the `class` attribute.
fn write_skills(layout: &OutputLayout, records: &[EntityRecord]) -> Result<()> {
    let mut by_class: BTreeMap<String, Vec<&EntityRecord>> = BTreeMap::new();
    for record in records {
        let class = record
            .attribute("class")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        by_class.entry(class_slug(class)).or_default().push(record);
    }
    let staged = StagedDir::create(&layout.skills_dir())?;
    for (slug, batch) in &by_class {
        write_json_atomic(&staged.path().join(format!("{slug}.json")), batch)?;
    }
    staged.commit()?;
    Ok(())
}

/// Flushes the full issue list. Written even when the build fails late.
pub fn write_build_log(layout: &OutputLayout, stats: &BuildStats) -> Result<()> {
    write_bytes_atomic(&layout.build_log(), stats.render_log().as_bytes())?;
    Ok(())
}
