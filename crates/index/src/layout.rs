use std::path::{Path, PathBuf};

use crate::records::Partition;

pub const SKILLS_DIR: &str = "skills";
pub const INDEXES_DIR: &str = "indexes";

pub const ID_LOOKUP_FILE: &str = "id_lookup.json";
pub const TAG_INDEX_FILE: &str = "tag_index.json";
pub const MECHANICS_FILE: &str = "mechanics.json";
pub const CROSS_REFERENCE_FILE: &str = "unique_cross_reference.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// File names of everything the database writer and index builder emit under
/// one output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reference(&self) -> PathBuf {
        self.root.join("reference.json")
    }

    pub fn tags(&self) -> PathBuf {
        self.root.join("tags.json")
    }

    pub fn version(&self) -> PathBuf {
        self.root.join("version.json")
    }

    pub fn validation_report(&self) -> PathBuf {
        self.root.join("validation_report.json")
    }

    pub fn validation_report_md(&self) -> PathBuf {
        self.root.join("validation_report.md")
    }

    pub fn build_log(&self) -> PathBuf {
        self.root.join("build.log")
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.root.join(SKILLS_DIR)
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.root.join(INDEXES_DIR)
    }

    /// Single-file partitions. Skills live in per-class files under
    /// [`OutputLayout::skills_dir`] and have no single path.
    pub fn partition_file(&self, partition: Partition) -> Option<PathBuf> {
        let name = match partition {
            Partition::AffixIdol => "affixes_idol.json",
            Partition::AffixItem => "affixes_item.json",
            Partition::Unique => "uniques_overview.json",
            Partition::Set => "sets.json",
            Partition::Ailment => "ailments.json",
            Partition::Monster => "monsters.json",
            Partition::Skill => return None,
        };
        Some(self.root.join(name))
    }

    pub fn index_file(&self, name: &str) -> PathBuf {
        self.indexes_dir().join(name)
    }

    /// Every output whose absence forces a rebuild.
    pub fn declared_outputs(&self) -> Vec<PathBuf> {
        let mut outputs = vec![
            self.reference(),
            self.tags(),
            self.version(),
            self.validation_report(),
            self.skills_dir(),
            self.indexes_dir(),
        ];
        outputs.extend(
            Partition::ALL
                .iter()
                .filter_map(|partition| self.partition_file(*partition)),
        );
        for name in [
            ID_LOOKUP_FILE,
            TAG_INDEX_FILE,
            MECHANICS_FILE,
            CROSS_REFERENCE_FILE,
            SUMMARY_FILE,
        ] {
            outputs.push(self.index_file(name));
        }
        outputs
    }
}

/// Normalises a class label into a file stem: `Void Knight` -> `void_knight`.
pub fn class_slug(class: &str) -> String {
    let mut slug = String::new();
    for ch in class.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        "general".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_slug_normalises_labels() {
        assert_eq!(class_slug("Void Knight"), "void_knight");
        assert_eq!(class_slug("  Mage "), "mage");
        assert_eq!(class_slug("???"), "general");
    }

    #[test]
    fn declared_outputs_cover_partitions_and_indexes() {
        let layout = OutputLayout::new("/tmp/db");
        let outputs = layout.declared_outputs();
        assert!(outputs.contains(&PathBuf::from("/tmp/db/affixes_idol.json")));
        assert!(outputs.contains(&PathBuf::from("/tmp/db/skills")));
        assert!(outputs.contains(&PathBuf::from("/tmp/db/indexes/summary.json")));
        assert!(!outputs.contains(&PathBuf::from("/tmp/db/build.log")));
    }
}
