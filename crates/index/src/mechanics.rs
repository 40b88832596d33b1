// Hand-maintained seed table, known to be incomplete. A missing link means
// "unknown", not "unrelated".

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mechanic {
    pub name: &'static str,
    pub parent: Option<&'static str>,
}

pub const MECHANICS: &[Mechanic] = &[
    Mechanic { name: "damage", parent: None },
    Mechanic { name: "hit_damage", parent: Some("damage") },
    Mechanic { name: "damage_over_time", parent: Some("damage") },
    Mechanic { name: "physical", parent: Some("hit_damage") },
    Mechanic { name: "elemental", parent: Some("hit_damage") },
    Mechanic { name: "fire", parent: Some("elemental") },
    Mechanic { name: "cold", parent: Some("elemental") },
    Mechanic { name: "lightning", parent: Some("elemental") },
    Mechanic { name: "void", parent: Some("hit_damage") },
    Mechanic { name: "necrotic", parent: Some("hit_damage") },
    Mechanic { name: "poison", parent: Some("hit_damage") },
    Mechanic { name: "ignite", parent: Some("damage_over_time") },
    Mechanic { name: "bleed", parent: Some("damage_over_time") },
    Mechanic { name: "poison_dot", parent: Some("damage_over_time") },
    Mechanic { name: "electrify", parent: Some("damage_over_time") },
    Mechanic { name: "frostbite", parent: Some("damage_over_time") },
    Mechanic { name: "time_rot", parent: Some("damage_over_time") },
    Mechanic { name: "critical_strike", parent: Some("hit_damage") },
    Mechanic { name: "minion_damage", parent: Some("damage") },
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MechanicNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<&'static str>,
    pub children: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MechanicsIndex {
    pub complete: bool,
    pub mechanics: BTreeMap<&'static str, MechanicNode>,
}

pub fn build_mechanics_index() -> MechanicsIndex {
    let mut mechanics: BTreeMap<&'static str, MechanicNode> = MECHANICS
        .iter()
        .map(|m| {
            (
                m.name,
                MechanicNode {
                    parent: m.parent,
                    children: Vec::new(),
                    ancestors: ancestors(m.name),
                },
            )
        })
        .collect();
    for mechanic in MECHANICS {
        if let Some(parent) = mechanic.parent {
            if let Some(node) = mechanics.get_mut(parent) {
                node.children.push(mechanic.name);
            }
        }
    }
    for node in mechanics.values_mut() {
        node.children.sort_unstable();
    }
    MechanicsIndex {
        complete: false,
        mechanics,
    }
}

fn ancestors(name: &str) -> Vec<&'static str> {
    let mut chain = Vec::new();
    let mut current = MECHANICS.iter().find(|m| m.name == name);
    while let Some(parent) = current.and_then(|m| m.parent) {
        if chain.contains(&parent) {
            break;
        }
        chain.push(parent);
        current = MECHANICS.iter().find(|m| m.name == parent);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_parent_is_declared() {
        for mechanic in MECHANICS {
            if let Some(parent) = mechanic.parent {
                assert!(
                    MECHANICS.iter().any(|m| m.name == parent),
                    "{} has undeclared parent {parent}",
                    mechanic.name
                );
            }
        }
    }

    #[test]
    fn children_are_linked_back() {
        let index = build_mechanics_index();
        assert!(!index.complete);
        assert_eq!(
            index.mechanics["elemental"].children,
            vec!["cold", "fire", "lightning"]
        );
        assert_eq!(index.mechanics["damage"].parent, None);
        assert_eq!(
            index.mechanics["ignite"].ancestors,
            vec!["damage_over_time", "damage"]
        );
    }

    #[test]
    fn ancestors_walk_to_root() {
        assert_eq!(ancestors("fire"), vec!["elemental", "hit_damage", "damage"]);
        assert!(ancestors("damage").is_empty());
        assert!(ancestors("unknown").is_empty());
    }
}
