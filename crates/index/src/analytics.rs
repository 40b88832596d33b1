use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reader::read_json;

/// Per-unique annotations maintained outside the reconciliation sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueAnalytics {
    #[serde(default)]
    pub archetypes: Vec<String>,
    #[serde(default)]
    pub skill_synergies: Vec<String>,
    #[serde(default)]
    pub damage_types: Vec<String>,
}

pub type AnalyticsOverlay = BTreeMap<u32, UniqueAnalytics>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub by_archetype: BTreeMap<String, Vec<u32>>,
    pub by_skill: BTreeMap<String, Vec<u32>>,
    pub by_damage_type: BTreeMap<String, Vec<u32>>,
    pub unknown_ids: Vec<u32>,
}

pub fn load_overlay(path: &Path) -> Result<AnalyticsOverlay> {
    if !path.exists() {
        return Ok(AnalyticsOverlay::new());
    }
    let raw: BTreeMap<String, UniqueAnalytics> =
        read_json(path).context("invalid analytics overlay")?;
    let mut overlay = AnalyticsOverlay::new();
    for (key, entry) in raw {
        match key.trim().parse::<u32>() {
            Ok(id) => {
                overlay.insert(id, entry);
            }
            Err(_) => tracing::warn!(
                stage = "index",
                "analytics overlay key {key:?} is not a unique id, skipping"
            ),
        }
    }
    Ok(overlay)
}

/// Folds the overlay into lookup tables keyed by annotation. Entries for ids
/// that are not in the written unique set are reported, not indexed.
pub fn build_cross_reference(overlay: &AnalyticsOverlay, known: &BTreeSet<u32>) -> CrossReference {
    let mut xref = CrossReference::default();
    for (id, entry) in overlay {
        if !known.contains(id) {
            xref.unknown_ids.push(*id);
            continue;
        }
        push_all(&mut xref.by_archetype, &entry.archetypes, *id);
        push_all(&mut xref.by_skill, &entry.skill_synergies, *id);
        push_all(&mut xref.by_damage_type, &entry.damage_types, *id);
    }
    for ids in xref
        .by_archetype
        .values_mut()
        .chain(xref.by_skill.values_mut())
        .chain(xref.by_damage_type.values_mut())
    {
        ids.sort_unstable();
        ids.dedup();
    }
    xref
}

fn push_all(target: &mut BTreeMap<String, Vec<u32>>, keys: &[String], id: u32) {
    for key in keys {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        target.entry(key).or_default().push(id);
    }
}
