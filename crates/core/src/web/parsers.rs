use serde_json::{Number, Value};

use super::card::Card;
use super::WebDescriptor;
use crate::model::{Attributes, Category};
use crate::namespace::keyword_namespace;

const LEVEL_ALIASES: &[&str] = &["level", "required_level", "requires_level", "level_req"];
const BASE_TYPE_ALIASES: &[&str] = &["base", "item_type", "base_item"];
const CLASS_REQUIREMENT_ALIASES: &[&str] = &["class", "required_class", "requires_class"];
const SET_NAME_ALIASES: &[&str] = &["set", "part_of", "item_set"];
const SKILL_CLASS_ALIASES: &[&str] = &["mastery", "character_class"];
const MAX_STACKS_ALIASES: &[&str] = &["stacks", "maximum_stacks", "stack_limit"];
const MONSTER_TYPE_ALIASES: &[&str] = &["type", "rarity", "monster_rarity"];

pub const DEFAULT_SKILL_CLASS: &str = "general";

pub fn describe(category: Category, card: Card, source: String) -> WebDescriptor {
    let mut attributes: Attributes = card
        .stats
        .iter()
        .map(|(key, value)| (snake_case(key), stat_value(value)))
        .collect();
    if let Some(tiers) = &card.tiers {
        attributes.insert("tiers".to_string(), tiers.to_value());
    }
    if !card.tags.is_empty() {
        attributes.insert("tags".to_string(), string_array(&card.tags));
    }

    let mut namespace_hint = None;
    match category {
        Category::Affix => {
            namespace_hint = [
                card.type_line.as_deref(),
                Some(card.title.as_str()),
                card.description.as_deref(),
            ]
            .into_iter()
            .flatten()
            .find_map(keyword_namespace);
            if let Some(kind) = card.type_line.as_deref().and_then(affix_type) {
                attributes.insert("affix_type".to_string(), Value::String(kind.to_string()));
            }
        }
        Category::Unique => {
            canonicalize(&mut attributes, "level_requirement", LEVEL_ALIASES);
            canonicalize(&mut attributes, "base_type", BASE_TYPE_ALIASES);
            canonicalize(&mut attributes, "class_requirement", CLASS_REQUIREMENT_ALIASES);
            if !attributes.contains_key("base_type") {
                if let Some(line) = &card.type_line {
                    let base = line.trim_start_matches("Unique").trim();
                    if !base.is_empty() {
                        attributes.insert("base_type".to_string(), Value::String(base.to_string()));
                    }
                }
            }
        }
        Category::Set => {
            canonicalize(&mut attributes, "set_name", SET_NAME_ALIASES);
            attributes
                .entry("set_name".to_string())
                .or_insert_with(|| Value::String(card.title.clone()));
            if !card.bonuses.is_empty() {
                attributes.insert("bonuses".to_string(), string_array(&card.bonuses));
            }
        }
        Category::Skill => {
            canonicalize(&mut attributes, "class", SKILL_CLASS_ALIASES);
            let has_class = attributes
                .get("class")
                .and_then(Value::as_str)
                .is_some_and(|c| !c.is_empty());
            if !has_class {
                attributes.insert("class".to_string(), Value::String(DEFAULT_SKILL_CLASS.to_string()));
            }
        }
        Category::Ailment => {
            canonicalize(&mut attributes, "max_stacks", MAX_STACKS_ALIASES);
        }
        Category::Monster => {
            canonicalize(&mut attributes, "monster_type", MONSTER_TYPE_ALIASES);
            if !attributes.contains_key("monster_type") {
                if let Some(line) = &card.type_line {
                    attributes.insert("monster_type".to_string(), Value::String(line.clone()));
                }
            }
        }
    }

    WebDescriptor {
        category,
        name: card.title,
        description: card.description,
        attributes,
        namespace_hint,
        source,
    }
}

fn affix_type(type_line: &str) -> Option<&'static str> {
    let lower = type_line.to_lowercase();
    if lower.contains("prefix") {
        Some("prefix")
    } else if lower.contains("suffix") {
        Some("suffix")
    } else {
        None
    }
}

/// Moves the first present alias to `canonical` unless it is already set.
fn canonicalize(attributes: &mut Attributes, canonical: &str, aliases: &[&str]) {
    if attributes.contains_key(canonical) {
        return;
    }
    if let Some(value) = aliases.iter().find_map(|alias| attributes.remove(*alias)) {
        attributes.insert(canonical.to_string(), value);
    }
}

/// `Level Requirement` -> `level_requirement`.
pub fn snake_case(key: &str) -> String {
    key.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Integers and decimals become JSON numbers, everything else stays text.
pub fn stat_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(raw.to_string())
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}
