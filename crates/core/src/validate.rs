use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::model::{Dataset, Scope};
use crate::stats::{BuildContext, IssueTally, Stage};

pub const DEFAULT_SUSPICIOUS_MARKERS: &[&str] = &["Unknown", "???", "Placeholder", "TBD", "[WIP]"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateName {
    pub name: String,
    pub first_id: u32,
    pub duplicate_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousName {
    pub id: u32,
    pub name: String,
    pub marker: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    pub total: usize,
    pub filled: usize,
    pub placeholders: Vec<u32>,
    pub duplicates: Vec<DuplicateName>,
    pub suspicious: Vec<SuspiciousName>,
}

/// Deterministic for identical input: no timestamps, BTreeMap keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub partitions: BTreeMap<String, PartitionReport>,
    pub build_issues: IssueTally,
}

impl ValidationReport {
    pub fn duplicate_count(&self) -> usize {
        self.partitions.values().map(|p| p.duplicates.len()).sum()
    }

    pub fn placeholder_count(&self) -> usize {
        self.partitions.values().map(|p| p.placeholders.len()).sum()
    }

    pub fn suspicious_count(&self) -> usize {
        self.partitions.values().map(|p| p.suspicious.len()).sum()
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::from("# Validation report\n\n");
        out.push_str("| partition | total | filled | placeholders | duplicates | suspicious |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for (label, part) in &self.partitions {
            let _ = writeln!(
                out,
                "| {label} | {} | {} | {} | {} | {} |",
                part.total,
                part.filled,
                part.placeholders.len(),
                part.duplicates.len(),
                part.suspicious.len()
            );
        }
        let tally = &self.build_issues;
        let _ = writeln!(
            out,
            "\nBuild issues: {} warnings, {} data-quality, {} surplus, {} degraded.",
            tally.warnings, tally.data_quality, tally.surplus, tally.degraded
        );

        for (label, part) in &self.partitions {
            if part.duplicates.is_empty() && part.suspicious.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n## {label}\n");
            for dup in &part.duplicates {
                let _ = writeln!(
                    out,
                    "- duplicate name {:?}: {} and {}",
                    dup.name, dup.first_id, dup.duplicate_id
                );
            }
            for s in &part.suspicious {
                let _ = writeln!(out, "- suspicious name {:?} on {} ({})", s.name, s.id, s.marker);
            }
        }
        out
    }
}

/// Scans every scope. Findings are also recorded as data-quality issues;
/// the build tally is captured after them.
pub fn validate(dataset: &Dataset, markers: &[String], ctx: &mut BuildContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    let lowered: Vec<(String, &str)> = markers
        .iter()
        .map(|m| (m.to_lowercase(), m.as_str()))
        .collect();

    for scope in Scope::all() {
        let part = validate_scope(dataset, scope, &lowered);
        for dup in &part.duplicates {
            ctx.stats.data_quality(
                Stage::Validate,
                format!(
                    "duplicate {scope} name {:?}: ids {} and {}",
                    dup.name, dup.first_id, dup.duplicate_id
                ),
            );
        }
        if !part.placeholders.is_empty() {
            ctx.stats.data_quality(
                Stage::Validate,
                format!("{} unresolved {scope} placeholders", part.placeholders.len()),
            );
        }
        for s in &part.suspicious {
            ctx.stats.data_quality(
                Stage::Validate,
                format!("suspicious {scope} name {:?} on {} ({})", s.name, s.id, s.marker),
            );
        }
        ctx.stats.add_ok(Stage::Validate);
        report.partitions.insert(scope.label().to_string(), part);
    }
    report.build_issues = ctx.stats.tally();
    tracing::info!(
        stage = "validate",
        "{} duplicates, {} placeholders, {} suspicious names",
        report.duplicate_count(),
        report.placeholder_count(),
        report.suspicious_count()
    );
    report
}

fn validate_scope(dataset: &Dataset, scope: Scope, markers: &[(String, &str)]) -> PartitionReport {
    let mut part = PartitionReport::default();
    let mut seen: HashMap<&str, u32> = HashMap::new();
    for entity in dataset.entities(scope) {
        part.total += 1;
        let Some(name) = entity.name.as_deref() else {
            part.placeholders.push(entity.id);
            continue;
        };
        part.filled += 1;
        match seen.get(name) {
            Some(first_id) => part.duplicates.push(DuplicateName {
                name: name.to_string(),
                first_id: *first_id,
                duplicate_id: entity.id,
            }),
            None => {
                seen.insert(name, entity.id);
            }
        }
        let lower = name.to_lowercase();
        if let Some((_, marker)) = markers.iter().find(|(m, _)| lower.contains(m.as_str())) {
            part.suspicious.push(SuspiciousName {
                id: entity.id,
                name: name.to_string(),
                marker: marker.to_string(),
            });
        }
    }
    part
}

pub fn default_markers() -> Vec<String> {
    DEFAULT_SUSPICIOUS_MARKERS.iter().map(|m| m.to_string()).collect()
}
