use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Category, Dataset, Entity, Namespace, Scope};
use crate::stats::{BuildContext, Stage};
use crate::templates::TemplateSet;

static IDOL_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(idol|blessing|minion|omen|grand|ornate|huge|adorned)s?\b")
        .expect("valid regex")
});

static ITEM_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(helmet|helm|body armou?r|weapon|amulet|ring|belt|boots|gloves|relic|shield|quiver|catalyst)s?\b",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    /// Membership in an aggregate template rule.
    Authoritative,
    Keyword,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub namespace: Namespace,
    pub source: ClassificationSource,
}

/// ID sets taken from the aggregate rules. `None` means the rule was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceSets {
    pub idol: Option<BTreeSet<u32>>,
    pub item: Option<BTreeSet<u32>>,
}

impl NamespaceSets {
    pub fn from_templates(templates: &TemplateSet, ctx: &mut BuildContext) -> Self {
        let mut sets = NamespaceSets::default();
        for rule in templates
            .aggregates
            .iter()
            .filter(|rule| rule.category == Category::Affix)
        {
            let target = match aggregate_namespace(&rule.name) {
                Some(Namespace::Idol) => &mut sets.idol,
                Some(Namespace::Item) => &mut sets.item,
                None => continue,
            };
            target.get_or_insert_with(BTreeSet::new).extend(rule.ids.iter().copied());
        }

        for (namespace, set) in [(Namespace::Idol, &sets.idol), (Namespace::Item, &sets.item)] {
            if set.is_none() {
                ctx.stats.degraded(
                    Stage::Namespace,
                    format!("aggregate rule for {namespace} affixes is missing; falling back to keywords"),
                );
            }
        }
        if let (Some(idol), Some(item)) = (&sets.idol, &sets.item) {
            for id in idol.intersection(item) {
                ctx.stats.data_quality(
                    Stage::Namespace,
                    format!("affix {id} is listed for both idols and items; treating as idol"),
                );
            }
        }
        sets
    }

    pub fn is_degraded(&self) -> bool {
        self.idol.is_none() || self.item.is_none()
    }

    fn authoritative(&self, id: u32) -> Option<Namespace> {
        if self.idol.as_ref().is_some_and(|s| s.contains(&id)) {
            return Some(Namespace::Idol);
        }
        if self.item.as_ref().is_some_and(|s| s.contains(&id)) {
            return Some(Namespace::Item);
        }
        None
    }
}

/// Maps an aggregate rule display name onto the namespace it enumerates.
pub fn aggregate_namespace(display: &str) -> Option<Namespace> {
    let normalized = display
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    match normalized.as_str() {
        "all idol affixes" | "all affixes for idols" => Some(Namespace::Idol),
        "all item affixes" | "all affixes for items" => Some(Namespace::Item),
        _ => None,
    }
}

/// Keyword heuristic. Idol keywords are checked first.
pub fn keyword_namespace(text: &str) -> Option<Namespace> {
    if IDOL_KEYWORDS.is_match(text) {
        Some(Namespace::Idol)
    } else if ITEM_KEYWORDS.is_match(text) {
        Some(Namespace::Item)
    } else {
        None
    }
}

pub fn classify(id: Option<u32>, hint: Option<Namespace>, sets: &NamespaceSets) -> Classification {
    if let Some(namespace) = id.and_then(|id| sets.authoritative(id)) {
        return Classification {
            namespace,
            source: ClassificationSource::Authoritative,
        };
    }
    match hint {
        Some(namespace) => Classification {
            namespace,
            source: ClassificationSource::Keyword,
        },
        None => Classification {
            namespace: Namespace::Item,
            source: ClassificationSource::Default,
        },
    }
}

/// Turns template slots into the initial dataset, one partition per scope.
pub fn seed_dataset(templates: &TemplateSet, sets: &NamespaceSets, ctx: &mut BuildContext) -> Dataset {
    let mut dataset = Dataset::new();
    dataset.reference = templates.reference.clone();
    for (category, slots) in &templates.slots {
        for slot in slots.values() {
            let scope = if *category == Category::Affix {
                let hint = slot.name.as_deref().and_then(keyword_namespace);
                let classification = classify(Some(slot.id), hint, sets);
                if classification.source != ClassificationSource::Authoritative {
                    ctx.stats.data_quality(
                        Stage::Namespace,
                        format!(
                            "affix {} ({}) not in any aggregate rule; {:?} classification chose {}",
                            slot.id,
                            slot.name.as_deref().unwrap_or("placeholder"),
                            classification.source,
                            classification.namespace
                        ),
                    );
                }
                Scope::affix(classification.namespace)
            } else {
                Scope::of(*category)
            };
            let entity = match &slot.name {
                Some(name) => Entity::named(slot.id, name.clone()),
                None => Entity::placeholder(slot.id),
            };
            dataset.insert_slot(scope, entity);
            ctx.stats.add_ok(Stage::Namespace);
        }
    }
    tracing::info!(
        stage = "namespace",
        "seeded {} idol and {} item affix slots{}",
        dataset.len(Scope::affix(Namespace::Idol)),
        dataset.len(Scope::affix(Namespace::Item)),
        if sets.is_degraded() { " (degraded)" } else { "" }
    );
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::IssueKind;
    use crate::templates::{AggregateRule, TemplateSlot};

    fn templates_with(aggregates: Vec<AggregateRule>) -> TemplateSet {
        let mut templates = TemplateSet::default();
        templates.aggregates = aggregates;
        let affixes = templates.slots.entry(Category::Affix).or_default();
        for (id, name) in [(1, None), (2, Some("Of the Grand Omen")), (3, None)] {
            affixes.insert(
                id,
                TemplateSlot {
                    id,
                    name: name.map(str::to_string),
                },
            );
        }
        templates
    }

    fn rule(name: &str, ids: &[u32]) -> AggregateRule {
        AggregateRule {
            name: name.to_string(),
            category: Category::Affix,
            ids: ids.to_vec(),
        }
    }

    #[test]
    fn authoritative_sets_beat_keywords() {
        let mut ctx = BuildContext::new();
        let templates = templates_with(vec![
            rule("All Idol Affixes", &[1, 4]),
            rule("All  affixes for ITEMS", &[2, 3, 4]),
        ]);
        let sets = NamespaceSets::from_templates(&templates, &mut ctx);
        assert!(!sets.is_degraded());
        // 4 is in both sets
        assert_eq!(ctx.stats.count(IssueKind::DataQuality), 1);
        assert_eq!(classify(Some(4), None, &sets).namespace, Namespace::Idol);
        let two = classify(Some(2), Some(Namespace::Idol), &sets);
        assert_eq!(two.namespace, Namespace::Item);
        assert_eq!(two.source, ClassificationSource::Authoritative);
    }

    #[test]
    fn missing_rules_degrade_to_keywords_then_item() {
        let mut ctx = BuildContext::new();
        let templates = templates_with(vec![rule("All Idol Affixes", &[1])]);
        let sets = NamespaceSets::from_templates(&templates, &mut ctx);
        assert!(sets.is_degraded());
        assert_eq!(ctx.stats.count(IssueKind::Degraded), 1);

        let dataset = seed_dataset(&templates, &sets, &mut ctx);
        let idol = Scope::affix(Namespace::Idol);
        let item = Scope::affix(Namespace::Item);
        assert!(dataset.get(idol, 1).is_some());
        assert!(dataset.get(idol, 2).is_some());
        assert!(dataset.get(item, 3).is_some());
        assert_eq!(ctx.stats.count(IssueKind::DataQuality), 2);
    }

    #[test]
    fn keywords_match_whole_words() {
        assert_eq!(keyword_namespace("Ornate Idol Affix"), Some(Namespace::Idol));
        assert_eq!(keyword_namespace("Prefix for Rings"), Some(Namespace::Item));
        assert_eq!(keyword_namespace("Body Armour"), Some(Namespace::Item));
        assert_eq!(keyword_namespace("Damage during bleeding"), None);
    }

    #[test]
    fn classify_without_anything_defaults_to_item() {
        let sets = NamespaceSets::default();
        let c = classify(None, None, &sets);
        assert_eq!(c.namespace, Namespace::Item);
        assert_eq!(c.source, ClassificationSource::Default);
    }
}
