use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Attributes, Category, Dataset, Entity, Namespace, Scope};
use crate::namespace::{classify, NamespaceSets};
use crate::sources::SourceLayout;
use crate::stats::{BuildContext, Stage};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverrideRecord {
    pub name: Option<String>,
    pub description: Option<String>,
    pub attributes: Attributes,
    pub namespace: Option<Namespace>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorrectionRecord {
    pub corrected_name: Option<String>,
    pub corrected_description: Option<String>,
    pub attributes: Option<Attributes>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideFile {
    pub overrides: BTreeMap<u32, OverrideRecord>,
    pub corrections: BTreeMap<u32, CorrectionRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOverrideFile {
    overrides: BTreeMap<String, Value>,
    corrections: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideReport {
    pub overrides: usize,
    pub corrections: usize,
    pub created: usize,
    pub skipped: usize,
}

impl OverrideFile {
    /// Missing file is empty. A file that is not JSON is a warning and
    /// contributes nothing; a bad entry is a warning and only that entry
    /// is dropped.
    pub fn load(path: &Path, ctx: &mut BuildContext) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let raw: RawOverrideFile = match fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|err| err.to_string()))
        {
            Ok(raw) => raw,
            Err(err) => {
                ctx.stats.add_fail(Stage::Overrides);
                ctx.stats.warn(
                    Stage::Overrides,
                    format!("ignoring unparseable override file {}: {err}", path.display()),
                );
                return Self::default();
            }
        };
        Self {
            overrides: parse_entries(raw.overrides, "override", path, ctx),
            corrections: parse_entries(raw.corrections, "correction", path, ctx),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.corrections.is_empty()
    }
}

fn parse_entries<T: DeserializeOwned>(
    raw: BTreeMap<String, Value>,
    kind: &str,
    path: &Path,
    ctx: &mut BuildContext,
) -> BTreeMap<u32, T> {
    let mut out = BTreeMap::new();
    for (key, value) in raw {
        let Ok(id) = key.trim().parse::<u32>() else {
            ctx.stats.add_skip(Stage::Overrides);
            ctx.stats.warn(
                Stage::Overrides,
                format!("{kind} key {key:?} in {} is not a numeric ID", path.display()),
            );
            continue;
        };
        match serde_json::from_value(value) {
            Ok(record) => {
                out.insert(id, record);
            }
            Err(err) => {
                ctx.stats.add_skip(Stage::Overrides);
                ctx.stats.warn(
                    Stage::Overrides,
                    format!("malformed {kind} for {id} in {}: {err}", path.display()),
                );
            }
        }
    }
    out
}

pub fn apply_overrides(
    dataset: &mut Dataset,
    sources: &SourceLayout,
    sets: &NamespaceSets,
    ctx: &mut BuildContext,
) -> OverrideReport {
    let mut report = OverrideReport::default();
    for category in Category::ALL {
        let file = OverrideFile::load(&sources.override_file(category), ctx);
        if file.is_empty() {
            continue;
        }
        apply_file(dataset, category, &file, sets, &mut report, ctx);
    }
    tracing::info!(
        stage = "overrides",
        "applied {} overrides ({} created) and {} corrections",
        report.overrides,
        report.created,
        report.corrections
    );
    report
}

pub fn apply_file(
    dataset: &mut Dataset,
    category: Category,
    file: &OverrideFile,
    sets: &NamespaceSets,
    report: &mut OverrideReport,
    ctx: &mut BuildContext,
) {
    for (id, correction) in &file.corrections {
        let scopes = dataset.scopes_holding(category, *id);
        if scopes.is_empty() {
            report.skipped += 1;
            ctx.stats.add_skip(Stage::Overrides);
            ctx.stats.warn(
                Stage::Overrides,
                format!("correction for missing {category} {id} skipped"),
            );
            continue;
        }
        for scope in scopes {
            if let Some(entity) = dataset.get_mut(scope, *id) {
                correct(entity, correction);
            }
        }
        if let Some(reason) = &correction.reason {
            tracing::debug!(stage = "overrides", "corrected {category} {id}: {reason}");
        }
        report.corrections += 1;
        ctx.stats.add_ok(Stage::Overrides);
    }

    for (id, record) in &file.overrides {
        let scopes = override_scopes(dataset, category, *id, record.namespace, sets);
        let mut moved = false;
        for stale in dataset.scopes_holding(category, *id) {
            if scopes.contains(&stale) {
                continue;
            }
            dataset.remove(stale, *id);
            moved = true;
            ctx.stats.data_quality(
                Stage::Overrides,
                format!("override moves {category} {id} out of {stale}"),
            );
        }
        for scope in scopes {
            let replacement = Entity {
                id: *id,
                name: record.name.clone(),
                description: record.description.clone(),
                attributes: record.attributes.clone(),
            };
            if dataset.upsert(scope, replacement).is_none() && !moved {
                report.created += 1;
                ctx.stats.warn(
                    Stage::Overrides,
                    format!("override creates {scope} {id} outside the template ID space"),
                );
            }
        }
        report.overrides += 1;
        ctx.stats.add_ok(Stage::Overrides);
    }
}

/// Explicit namespace, then every namespace already holding the ID, then
/// the authoritative sets, then `item`.
fn override_scopes(
    dataset: &Dataset,
    category: Category,
    id: u32,
    namespace: Option<Namespace>,
    sets: &NamespaceSets,
) -> Vec<Scope> {
    if category != Category::Affix {
        return vec![Scope::of(category)];
    }
    if let Some(namespace) = namespace {
        return vec![Scope::affix(namespace)];
    }
    let holding = dataset.scopes_holding(category, id);
    if !holding.is_empty() {
        return holding;
    }
    vec![Scope::affix(classify(Some(id), None, sets).namespace)]
}

fn correct(entity: &mut Entity, correction: &CorrectionRecord) {
    if let Some(name) = &correction.corrected_name {
        entity.name = Some(name.clone());
    }
    if let Some(description) = &correction.corrected_description {
        entity.description = Some(description.clone());
    }
    if let Some(attributes) = &correction.attributes {
        entity
            .attributes
            .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}
