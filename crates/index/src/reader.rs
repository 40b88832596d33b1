use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

use crate::layout::OutputLayout;
use crate::records::{EntityRecord, Partition, UniqueOverviewRecord, VersionRecord};

/// The database as it exists on disk after the writer finished. The index
/// builder works from this, never from the in-memory pipeline state.
#[derive(Debug, Default, Clone)]
pub struct WrittenDatabase {
    pub partitions: BTreeMap<Partition, Vec<EntityRecord>>,
    pub skill_classes: BTreeMap<u32, String>,
    pub uniques: Vec<UniqueOverviewRecord>,
    pub tags: Vec<String>,
    pub version: Option<VersionRecord>,
}

impl WrittenDatabase {
    pub fn load(layout: &OutputLayout) -> Result<Self> {
        if !layout.root().exists() {
            return Err(anyhow!(
                "database directory {} does not exist",
                layout.root().display()
            ));
        }
        let mut db = WrittenDatabase::default();
        for partition in Partition::ALL {
            match partition {
                Partition::Skill => {
                    let (records, classes) = load_skills(&layout.skills_dir())?;
                    db.skill_classes = classes;
                    db.partitions.insert(partition, records);
                }
                Partition::Unique => {
                    let Some(path) = layout.partition_file(partition) else {
                        continue;
                    };
                    let uniques: Vec<UniqueOverviewRecord> = read_json_or_default(&path)?;
                    db.partitions
                        .insert(partition, uniques.iter().map(overview_as_entity).collect());
                    db.uniques = uniques;
                }
                _ => {
                    let Some(path) = layout.partition_file(partition) else {
                        continue;
                    };
                    db.partitions.insert(partition, read_json_or_default(&path)?);
                }
            }
        }
        db.tags = read_json_or_default(&layout.tags())?;
        let version_path = layout.version();
        if version_path.exists() {
            db.version = Some(read_json(&version_path)?);
        }
        Ok(db)
    }

    pub fn records(&self, partition: Partition) -> &[EntityRecord] {
        self.partitions
            .get(&partition)
            .map(|records| records.as_slice())
            .unwrap_or(&[])
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.partitions
            .iter()
            .map(|(partition, records)| (partition.as_str().to_string(), records.len()))
            .collect()
    }
}

fn load_skills(dir: &Path) -> Result<(Vec<EntityRecord>, BTreeMap<u32, String>)> {
    let mut records = Vec::new();
    let mut classes = BTreeMap::new();
    if !dir.exists() {
        return Ok((records, classes));
    }
    let mut files: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    files.sort();
    for path in files {
        let class = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("general")
            .to_string();
        let batch: Vec<EntityRecord> = read_json(&path)?;
        for record in batch {
            classes.insert(record.id, class.clone());
            records.push(record);
        }
    }
    records.sort_by_key(|record| record.id);
    Ok((records, classes))
}

fn overview_as_entity(overview: &UniqueOverviewRecord) -> EntityRecord {
    let mut attributes = BTreeMap::new();
    if let Some(value) = &overview.base_type {
        attributes.insert("base_type".to_string(), value.clone());
    }
    if let Some(value) = &overview.level_requirement {
        attributes.insert("level_requirement".to_string(), value.clone());
    }
    if let Some(value) = &overview.class_requirement {
        attributes.insert("class_requirement".to_string(), value.clone());
    }
    EntityRecord {
        id: overview.id,
        name: overview.name.clone(),
        description: overview.description.clone(),
        attributes,
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn load_collects_skills_across_class_files() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        fs::create_dir_all(layout.skills_dir()).unwrap();
        fs::write(
            layout.skills_dir().join("mage.json"),
            json!([{"id": 5, "name": "Fireball"}]).to_string(),
        )
        .unwrap();
        fs::write(
            layout.skills_dir().join("sentinel.json"),
            json!([{"id": 2, "name": "Lunge"}]).to_string(),
        )
        .unwrap();

        let db = WrittenDatabase::load(&layout).unwrap();
        let skills = db.records(Partition::Skill);
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].id, 2);
        assert_eq!(db.skill_classes.get(&5).map(String::as_str), Some("mage"));
        assert!(db.records(Partition::Monster).is_empty());
    }

    #[test]
    fn load_fails_without_database_dir() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("missing"));
        assert!(WrittenDatabase::load(&layout).is_err());
    }
}
