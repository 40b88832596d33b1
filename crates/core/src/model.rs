use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use refforge_index::{EntityRecord, Partition, ReferenceRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Affix,
    Unique,
    Set,
    Skill,
    Ailment,
    Monster,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Affix,
        Category::Unique,
        Category::Set,
        Category::Skill,
        Category::Ailment,
        Category::Monster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Affix => "affix",
            Category::Unique => "unique",
            Category::Set => "set",
            Category::Skill => "skill",
            Category::Ailment => "ailment",
            Category::Monster => "monster",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Category::Affix => "affixes",
            Category::Unique => "uniques",
            Category::Set => "sets",
            Category::Skill => "skills",
            Category::Ailment => "ailments",
            Category::Monster => "monsters",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_lowercase().as_str() {
            "affix" => Some(Category::Affix),
            "unique" => Some(Category::Unique),
            "set" => Some(Category::Set),
            "skill" => Some(Category::Skill),
            "ailment" => Some(Category::Ailment),
            "monster" => Some(Category::Monster),
            _ => None,
        }
    }

    pub fn collects_tags(&self) -> bool {
        matches!(self, Category::Skill | Category::Ailment | Category::Monster)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Idol,
    Item,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Idol, Namespace::Item];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Idol => "idol",
            Namespace::Item => "item",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope {
    pub category: Category,
    pub namespace: Option<Namespace>,
}

impl Scope {
    pub fn of(category: Category) -> Self {
        debug_assert!(category != Category::Affix, "affix scopes need a namespace");
        Self {
            category,
            namespace: None,
        }
    }

    pub fn affix(namespace: Namespace) -> Self {
        Self {
            category: Category::Affix,
            namespace: Some(namespace),
        }
    }

    pub fn all() -> Vec<Scope> {
        let mut scopes = vec![Scope::affix(Namespace::Idol), Scope::affix(Namespace::Item)];
        scopes.extend(
            Category::ALL
                .iter()
                .filter(|c| **c != Category::Affix)
                .map(|c| Scope::of(*c)),
        );
        scopes
    }

    pub fn partition(&self) -> Partition {
        match (self.category, self.namespace) {
            (Category::Affix, Some(Namespace::Idol)) => Partition::AffixIdol,
            (Category::Affix, _) => Partition::AffixItem,
            (Category::Unique, _) => Partition::Unique,
            (Category::Set, _) => Partition::Set,
            (Category::Skill, _) => Partition::Skill,
            (Category::Ailment, _) => Partition::Ailment,
            (Category::Monster, _) => Partition::Monster,
        }
    }

    pub fn label(&self) -> &'static str {
        self.partition().as_str()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub attributes: Attributes,
}

impl Entity {
    pub fn placeholder(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn named(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_none()
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn to_record(&self) -> EntityRecord {
        EntityRecord {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    partitions: BTreeMap<Scope, BTreeMap<u32, Entity>>,
    declared: BTreeMap<Scope, usize>,
    pub reference: ReferenceRecord,
    pub tags: BTreeSet<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template slot. The first registration of an ID wins;
    /// returns `false` for a duplicate.
    pub fn insert_slot(&mut self, scope: Scope, entity: Entity) -> bool {
        let partition = self.partitions.entry(scope).or_default();
        if partition.contains_key(&entity.id) {
            return false;
        }
        partition.insert(entity.id, entity);
        *self.declared.entry(scope).or_default() += 1;
        true
    }

    /// Inserts or replaces outside the template ID space (manual overrides).
    pub fn upsert(&mut self, scope: Scope, entity: Entity) -> Option<Entity> {
        self.partitions
            .entry(scope)
            .or_default()
            .insert(entity.id, entity)
    }

    pub fn remove(&mut self, scope: Scope, id: u32) -> Option<Entity> {
        self.partitions.get_mut(&scope).and_then(|p| p.remove(&id))
    }

    pub fn entities(&self, scope: Scope) -> impl Iterator<Item = &Entity> {
        self.partitions.get(&scope).into_iter().flat_map(|p| p.values())
    }

    pub fn get(&self, scope: Scope, id: u32) -> Option<&Entity> {
        self.partitions.get(&scope).and_then(|p| p.get(&id))
    }

    pub fn get_mut(&mut self, scope: Scope, id: u32) -> Option<&mut Entity> {
        self.partitions.get_mut(&scope).and_then(|p| p.get_mut(&id))
    }

    /// Lowest ID in `scope` whose name is exactly `name`.
    pub fn find_by_name(&self, scope: Scope, name: &str) -> Option<u32> {
        self.entities(scope)
            .find(|e| e.name.as_deref() == Some(name))
            .map(|e| e.id)
    }

    pub fn lowest_placeholder(&self, scope: Scope) -> Option<u32> {
        self.entities(scope).find(|e| e.is_placeholder()).map(|e| e.id)
    }

    pub fn scopes_holding(&self, category: Category, id: u32) -> Vec<Scope> {
        self.partitions
            .iter()
            .filter(|(scope, entities)| scope.category == category && entities.contains_key(&id))
            .map(|(scope, _)| *scope)
            .collect()
    }

    pub fn declared(&self, scope: Scope) -> usize {
        self.declared.get(&scope).copied().unwrap_or(0)
    }

    pub fn len(&self, scope: Scope) -> usize {
        self.partitions.get(&scope).map(|p| p.len()).unwrap_or(0)
    }

    pub fn filled(&self, scope: Scope) -> usize {
        self.entities(scope).filter(|e| !e.is_placeholder()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.values().all(|p| p.is_empty())
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        Scope::all()
            .into_iter()
            .map(|scope| (scope.label().to_string(), self.len(scope)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_slot_registration_wins() {
        let mut dataset = Dataset::new();
        let scope = Scope::of(Category::Unique);
        assert!(dataset.insert_slot(scope, Entity::named(4, "Inferno Ring")));
        assert!(!dataset.insert_slot(scope, Entity::named(4, "Other Ring")));
        assert_eq!(
            dataset.get(scope, 4).and_then(|e| e.name.as_deref()),
            Some("Inferno Ring")
        );
        assert_eq!(dataset.declared(scope), 1);
    }

    #[test]
    fn lookups_walk_ids_in_ascending_order() {
        let mut dataset = Dataset::new();
        let scope = Scope::affix(Namespace::Item);
        dataset.insert_slot(scope, Entity::placeholder(9));
        dataset.insert_slot(scope, Entity::named(8, "Of Haste"));
        dataset.insert_slot(scope, Entity::placeholder(3));
        dataset.insert_slot(scope, Entity::named(2, "Of Haste"));
        assert_eq!(dataset.lowest_placeholder(scope), Some(3));
        assert_eq!(dataset.find_by_name(scope, "Of Haste"), Some(2));
        assert_eq!(dataset.find_by_name(Scope::affix(Namespace::Idol), "Of Haste"), None);
        assert_eq!(dataset.filled(scope), 2);
    }

    #[test]
    fn scope_maps_to_output_partition() {
        assert_eq!(Scope::affix(Namespace::Idol).label(), "affix_idol");
        assert_eq!(Scope::of(Category::Skill).partition(), Partition::Skill);
        assert_eq!(Scope::all().len(), 7);
    }
}
