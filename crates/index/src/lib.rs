mod analytics;
mod atomic;
mod layout;
mod lookup;
mod mechanics;
mod reader;
mod records;
mod tags;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use analytics::{
    build_cross_reference, load_overlay, AnalyticsOverlay, CrossReference, UniqueAnalytics,
};
pub use atomic::{write_bytes_atomic, write_json_atomic, StagedDir};
pub use layout::{
    class_slug, OutputLayout, CROSS_REFERENCE_FILE, ID_LOOKUP_FILE, INDEXES_DIR, MECHANICS_FILE,
    SKILLS_DIR, SUMMARY_FILE, TAG_INDEX_FILE,
};
pub use lookup::{build_id_lookup, IdLookup};
pub use mechanics::{build_mechanics_index, Mechanic, MechanicsIndex, MECHANICS};
pub use reader::{read_json, WrittenDatabase};
pub use records::{EntityRecord, Partition, ReferenceRecord, UniqueOverviewRecord, VersionRecord};
pub use tags::{build_tag_index, TagIndex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub version: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    pub counts: BTreeMap<String, usize>,
    pub vocabulary_tags: usize,
    pub indexed_tags: usize,
    pub mechanics: usize,
    pub analytics_entries: usize,
    pub files: Vec<String>,
}

/// Rebuilds every index from the files under `layout`. The `indexes/`
/// directory is staged and swapped in whole. `version` is the record about
/// to be written; without one the summary falls back to what is on disk.
pub fn build_indexes(
    layout: &OutputLayout,
    version: Option<&VersionRecord>,
    overlay: &AnalyticsOverlay,
) -> Result<IndexSummary> {
    let db = WrittenDatabase::load(layout).context("failed to load written database")?;
    let id_lookup = build_id_lookup(&db);
    let tag_index = build_tag_index(&db);
    let mechanics = build_mechanics_index();
    let version = version.or(db.version.as_ref());
    let known: BTreeSet<u32> = db.uniques.iter().map(|u| u.id).collect();
    let xref = build_cross_reference(overlay, &known);
    if !xref.unknown_ids.is_empty() {
        tracing::warn!(
            stage = "index",
            "analytics overlay references {} unknown unique ids: {:?}",
            xref.unknown_ids.len(),
            xref.unknown_ids
        );
    }

    let summary = IndexSummary {
        version: version.map(|v| v.version.clone()),
        built_at: version.map(|v| v.built_at),
        counts: db.counts(),
        vocabulary_tags: db.tags.len(),
        indexed_tags: tag_index.len(),
        mechanics: mechanics.mechanics.len(),
        analytics_entries: overlay.len() - xref.unknown_ids.len(),
        files: vec![
            ID_LOOKUP_FILE.to_string(),
            TAG_INDEX_FILE.to_string(),
            MECHANICS_FILE.to_string(),
            CROSS_REFERENCE_FILE.to_string(),
            SUMMARY_FILE.to_string(),
        ],
    };

    let staged = StagedDir::create(&layout.indexes_dir())?;
    write_json_atomic(&staged.path().join(ID_LOOKUP_FILE), &id_lookup)?;
    write_json_atomic(&staged.path().join(TAG_INDEX_FILE), &tag_index)?;
    write_json_atomic(&staged.path().join(MECHANICS_FILE), &mechanics)?;
    write_json_atomic(&staged.path().join(CROSS_REFERENCE_FILE), &xref)?;
    write_json_atomic(&staged.path().join(SUMMARY_FILE), &summary)?;
    staged.commit()?;
    tracing::info!(
        stage = "index",
        "indexes ready under {} ({} tags, {} analytics entries)",
        layout.indexes_dir().display(),
        summary.indexed_tags,
        summary.analytics_entries
    );
    Ok(summary)
}

pub fn load_summary(layout: &OutputLayout) -> Result<IndexSummary> {
    read_json(&layout.index_file(SUMMARY_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn seed_database(root: &Path) {
        let layout = OutputLayout::new(root);
        write_json_atomic(
            &layout.partition_file(Partition::AffixIdol).unwrap(),
            &json!([{"id": 1, "name": "Of the Inferno"}]),
        )
        .unwrap();
        write_json_atomic(
            &layout.partition_file(Partition::Unique).unwrap(),
            &json!([{"id": 17, "name": "Inferno Ring", "base_type": "Ring"}]),
        )
        .unwrap();
        write_json_atomic(
            &layout.skills_dir().join("mage.json"),
            &json!([{"id": 3, "name": "Fireball", "attributes": {"tags": ["Fire"]}}]),
        )
        .unwrap();
        write_json_atomic(&layout.tags(), &json!(["Fire"])).unwrap();
    }

    #[test]
    fn build_indexes_writes_every_index_file() {
        let dir = tempdir().unwrap();
        seed_database(dir.path());
        let analytics = dir.path().join("unique_analytics.json");
        fs::write(
            &analytics,
            r#"{"17": {"archetypes": ["Ignite"]}, "404": {"archetypes": ["Ghost"]}}"#,
        )
        .unwrap();
        let layout = OutputLayout::new(dir.path());

        let overlay = load_overlay(&analytics).unwrap();
        let summary = build_indexes(&layout, None, &overlay).unwrap();
        assert_eq!(summary.counts["unique"], 1);
        assert_eq!(summary.analytics_entries, 1);
        assert_eq!(summary.indexed_tags, 1);

        let lookup: Value = read_json(&layout.index_file(ID_LOOKUP_FILE)).unwrap();
        assert_eq!(lookup["unique"]["17"]["base_type"], json!("Ring"));
        let tags: Value = read_json(&layout.index_file(TAG_INDEX_FILE)).unwrap();
        assert_eq!(tags["Fire"]["skill"], json!([3]));
        let xref: Value = read_json(&layout.index_file(CROSS_REFERENCE_FILE)).unwrap();
        assert_eq!(xref["by_archetype"]["ignite"], json!([17]));
        assert_eq!(load_summary(&layout).unwrap(), summary);
    }

    #[test]
    fn summary_carries_the_pending_version() {
        let dir = tempdir().unwrap();
        seed_database(dir.path());
        let layout = OutputLayout::new(dir.path());
        let version = VersionRecord {
            version: "2.0".into(),
            built_at: Utc::now(),
            source_fingerprint: String::new(),
            generator: "test".into(),
            counts: BTreeMap::new(),
        };

        let summary = build_indexes(&layout, Some(&version), &AnalyticsOverlay::new()).unwrap();
        assert_eq!(summary.version.as_deref(), Some("2.0"));
        assert_eq!(summary.built_at, Some(version.built_at));
        assert!(!layout.version().exists());
    }

    #[test]
    fn rebuild_replaces_stale_index_files() {
        let dir = tempdir().unwrap();
        seed_database(dir.path());
        let layout = OutputLayout::new(dir.path());
        fs::create_dir_all(layout.indexes_dir()).unwrap();
        fs::write(layout.index_file("obsolete.json"), "{}").unwrap();

        build_indexes(&layout, None, &AnalyticsOverlay::new()).unwrap();
        assert!(!layout.index_file("obsolete.json").exists());
        assert!(layout.index_file(MECHANICS_FILE).exists());
    }
}
