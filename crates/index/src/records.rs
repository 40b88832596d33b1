use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-disk partition of the entity database. Affixes are split by namespace,
/// every other category is a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    AffixIdol,
    AffixItem,
    Unique,
    Set,
    Skill,
    Ailment,
    Monster,
}

impl Partition {
    pub const ALL: [Partition; 7] = [
        Partition::AffixIdol,
        Partition::AffixItem,
        Partition::Unique,
        Partition::Set,
        Partition::Skill,
        Partition::Ailment,
        Partition::Monster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::AffixIdol => "affix_idol",
            Partition::AffixItem => "affix_item",
            Partition::Unique => "unique",
            Partition::Set => "set",
            Partition::Skill => "skill",
            Partition::Ailment => "ailment",
            Partition::Monster => "monster",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Partition::AffixIdol | Partition::AffixItem => "affix",
            other => other.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: u32,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl EntityRecord {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn tags(&self) -> Vec<&str> {
        match self.attributes.get("tags") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// Size-sensitive projection of a unique item, consumed in bulk by filter tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueOverviewRecord {
    pub id: u32,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_requirement: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_requirement: Option<Value>,
}

impl UniqueOverviewRecord {
    pub fn from_entity(record: &EntityRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            base_type: record.attribute("base_type").cloned(),
            level_requirement: record.attribute("level_requirement").cloned(),
            class_requirement: record.attribute("class_requirement").cloned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub colors: BTreeMap<u32, String>,
    pub sounds: BTreeMap<u32, String>,
    pub beams: BTreeMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: String,
    pub built_at: DateTime<Utc>,
    pub source_fingerprint: String,
    pub generator: String,
    #[serde(default)]
    pub counts: BTreeMap<String, usize>,
}
