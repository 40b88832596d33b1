use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use once_cell::sync::Lazy;
use refforge_index::ReferenceRecord;
use regex::Regex;
use roxmltree::{Document, Node};

use crate::error::{RefError, Result};
use crate::model::Category;
use crate::stats::{BuildContext, Stage};

pub const MASTER_TEMPLATE: &str = "master.xml";

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(affix|unique|set|skill|ailment|monster)\s*#?\s*(\d+)\s*$")
        .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSlot {
    pub id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRule {
    pub name: String,
    pub category: Category,
    pub ids: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    pub slots: BTreeMap<Category, BTreeMap<u32, TemplateSlot>>,
    pub aggregates: Vec<AggregateRule>,
    pub reference: ReferenceRecord,
    pub documents: usize,
}

impl TemplateSet {
    pub fn slot_count(&self, category: Category) -> usize {
        self.slots.get(&category).map(|s| s.len()).unwrap_or(0)
    }

    fn register(
        &mut self,
        category: Category,
        id: u32,
        name: Option<&str>,
        source: &Path,
        ctx: &mut BuildContext,
    ) {
        let slots = self.slots.entry(category).or_default();
        if let Some(existing) = slots.get(&id) {
            ctx.stats.data_quality(
                Stage::Templates,
                format!(
                    "duplicate template slot {category} {id} ({}) in {}; keeping {}",
                    name.unwrap_or("placeholder"),
                    source.display(),
                    existing.name.as_deref().unwrap_or("placeholder"),
                ),
            );
            return;
        }
        slots.insert(
            id,
            TemplateSlot {
                id,
                name: name.map(str::to_string),
            },
        );
    }
}

/// Reads `master.xml` (required) and every other `*.xml` under `dir`
/// (sorted by path, malformed ones skipped).
pub fn ingest_templates(dir: &Path, ctx: &mut BuildContext) -> Result<TemplateSet> {
    let master = dir.join(MASTER_TEMPLATE);
    if !master.is_file() {
        return Err(RefError::MissingTemplate(master));
    }
    let mut set = TemplateSet::default();
    let raw = fs::read_to_string(&master).map_err(|err| RefError::TemplateParse {
        path: master.clone(),
        reason: err.to_string(),
    })?;
    parse_document(&raw, &master, &mut set, ctx).map_err(|reason| RefError::TemplateParse {
        path: master.clone(),
        reason,
    })?;
    set.documents += 1;
    ctx.stats.add_ok(Stage::Templates);

    for path in extra_documents(dir, &master)? {
        let parsed = fs::read_to_string(&path)
            .map_err(|err| err.to_string())
            .and_then(|raw| parse_document(&raw, &path, &mut set, ctx));
        match parsed {
            Ok(()) => {
                set.documents += 1;
                ctx.stats.add_ok(Stage::Templates);
            }
            Err(reason) => {
                ctx.stats.add_fail(Stage::Templates);
                ctx.stats.warn(
                    Stage::Templates,
                    format!("skipping malformed template {}: {reason}", path.display()),
                );
            }
        }
    }
    tracing::info!(
        stage = "templates",
        "read {} template documents: {}",
        set.documents,
        Category::ALL
            .iter()
            .map(|c| format!("{c}={}", set.slot_count(*c)))
            .join(" ")
    );
    Ok(set)
}

fn extra_documents(dir: &Path, master: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_xml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xml"))
            .unwrap_or(false);
        if is_xml && path.is_file() && path != master {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn parse_document(
    raw: &str,
    source: &Path,
    set: &mut TemplateSet,
    ctx: &mut BuildContext,
) -> std::result::Result<(), String> {
    let doc = Document::parse(raw).map_err(|err| err.to_string())?;
    let root = doc.root_element();
    read_reference(root, &mut set.reference);
    for rule in root.descendants().filter(|n| n.has_tag_name("Rule")) {
        read_rule(rule, source, set, ctx);
    }
    Ok(())
}

fn read_rule(rule: Node, source: &Path, set: &mut TemplateSet, ctx: &mut BuildContext) {
    let display = child_text(rule, "nameOverride");
    let Some(display) = display else {
        ctx.stats.add_skip(Stage::Templates);
        ctx.stats.warn(
            Stage::Templates,
            format!(
                "rule without a display name at {} in {}",
                position(rule),
                source.display()
            ),
        );
        return;
    };

    if let Some((category, id)) = parse_placeholder(&display) {
        set.register(category, id, None, source, ctx);
        return;
    }

    let conditions: Vec<(Category, Vec<u32>)> = rule
        .descendants()
        .filter(|n| n.has_tag_name("Condition"))
        .filter_map(condition_ids)
        .filter(|(_, ids)| !ids.is_empty())
        .collect();
    let total: usize = conditions.iter().map(|(_, ids)| ids.len()).sum();
    match conditions.as_slice() {
        [] => {
            ctx.stats.add_skip(Stage::Templates);
            ctx.stats.warn(
                Stage::Templates,
                format!(
                    "rule {display:?} in {} carries no ID condition",
                    source.display()
                ),
            );
        }
        [(category, ids)] if total == 1 => {
            set.register(*category, ids[0], Some(display.as_str()), source, ctx);
        }
        [(category, _), ..] => {
            let ids = conditions
                .iter()
                .filter(|(c, _)| c == category)
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect();
            set.aggregates.push(AggregateRule {
                name: display,
                category: *category,
                ids,
            });
        }
    }
}

/// `Affix 42` -> `(Affix, 42)`. Anything beyond a category word and a
/// number is a real name.
pub fn parse_placeholder(display: &str) -> Option<(Category, u32)> {
    let caps = PLACEHOLDER_RE.captures(display)?;
    let category = Category::from_word(&caps[1])?;
    let id = caps[2].parse().ok()?;
    Some((category, id))
}

fn condition_ids(condition: Node) -> Option<(Category, Vec<u32>)> {
    let kind = condition.attribute("type")?;
    let (category, ids) = match kind {
        "AffixCondition" => (
            Category::Affix,
            list_ids(condition, "affixes", |n| n.has_tag_name("int")),
        ),
        "UniqueCondition" => (
            Category::Unique,
            entry_ids(condition),
        ),
        "SetCondition" => (Category::Set, entry_ids(condition)),
        "SkillCondition" => (Category::Skill, direct_id(condition)),
        "AilmentCondition" => (Category::Ailment, direct_id(condition)),
        "MonsterCondition" => (Category::Monster, direct_id(condition)),
        _ => return None,
    };
    Some((category, ids))
}

fn list_ids(condition: Node, list: &str, item: impl Fn(&Node) -> bool) -> Vec<u32> {
    condition
        .children()
        .filter(|n| n.has_tag_name(list))
        .flat_map(|n| n.children())
        .filter(|n| item(n))
        .filter_map(|n| n.text().and_then(|t| t.trim().parse().ok()))
        .collect()
}

fn entry_ids(condition: Node) -> Vec<u32> {
    condition
        .children()
        .filter(|n| n.has_tag_name("entries"))
        .flat_map(|n| n.children())
        .filter(|n| n.has_tag_name("Entry"))
        .filter_map(|entry| child_text(entry, "id"))
        .filter_map(|text| text.parse().ok())
        .collect()
}

fn direct_id(condition: Node) -> Vec<u32> {
    child_text(condition, "id")
        .and_then(|text| text.parse().ok())
        .into_iter()
        .collect()
}

fn read_reference(root: Node, reference: &mut ReferenceRecord) {
    for node in root.descendants().filter(Node::is_element) {
        let table = match node.tag_name().name() {
            "Color" => &mut reference.colors,
            "Sound" => &mut reference.sounds,
            "Beam" => &mut reference.beams,
            _ => continue,
        };
        let id = node.attribute("id").and_then(|v| v.trim().parse::<u32>().ok());
        let name = node.attribute("name").map(str::trim).filter(|v| !v.is_empty());
        if let (Some(id), Some(name)) = (id, name) {
            table.entry(id).or_insert_with(|| name.to_string());
        }
    }
}

fn child_text(node: Node, tag: &str) -> Option<String> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(|t| t.split_whitespace().join(" "))
        .filter(|t| !t.is_empty())
}

fn position(node: Node) -> String {
    let pos = node.document().text_pos_at(node.range().start);
    format!("line {}", pos.row)
}
