use serde::Serialize;

use crate::model::{Category, Dataset, Entity, Namespace, Scope};
use crate::namespace::{classify, ClassificationSource, NamespaceSets};
use crate::stats::{BuildContext, Stage};
use crate::web::WebDescriptor;

const CLOSE_NAME_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub merged: usize,
    pub filled: usize,
    pub surplus: usize,
    /// Affix descriptors scoped by keyword or default rather than by name.
    pub heuristic_scopes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Merged(u32),
    Filled(u32),
    Surplus,
}

pub fn reconcile<'a>(
    dataset: &mut Dataset,
    descriptors: impl IntoIterator<Item = &'a WebDescriptor>,
    sets: &NamespaceSets,
    ctx: &mut BuildContext,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    for descriptor in descriptors {
        let scope = resolve_scope(dataset, descriptor, sets, &mut report, ctx);
        match link(dataset, scope, descriptor) {
            Outcome::Merged(id) => {
                report.merged += 1;
                tracing::debug!(stage = "reconcile", "{} merged into {scope} {id}", descriptor.source);
            }
            Outcome::Filled(id) => {
                report.filled += 1;
                tracing::debug!(
                    stage = "reconcile",
                    "{} ({}) fills placeholder {scope} {id}",
                    descriptor.source,
                    descriptor.name
                );
            }
            Outcome::Surplus => {
                report.surplus += 1;
                let hint = closest_name(dataset, scope, &descriptor.name)
                    .map(|(id, name)| format!("; closest existing name is {name:?} ({id})"))
                    .unwrap_or_default();
                ctx.stats.surplus(
                    Stage::Reconcile,
                    format!(
                        "surplus {scope} record {:?} from {}, no template slot{hint}",
                        descriptor.name, descriptor.source
                    ),
                );
            }
        }
        ctx.stats.add_ok(Stage::Reconcile);
    }
    tracing::info!(
        stage = "reconcile",
        "merged={} filled={} surplus={}",
        report.merged,
        report.filled,
        report.surplus
    );
    report
}

/// Applies one descriptor to `scope`.
pub fn link(dataset: &mut Dataset, scope: Scope, descriptor: &WebDescriptor) -> Outcome {
    if let Some(id) = dataset.find_by_name(scope, &descriptor.name) {
        if let Some(entity) = dataset.get_mut(scope, id) {
            enrich(entity, descriptor);
        }
        return Outcome::Merged(id);
    }
    if let Some(id) = dataset.lowest_placeholder(scope) {
        if let Some(entity) = dataset.get_mut(scope, id) {
            entity.name = Some(descriptor.name.clone());
            enrich(entity, descriptor);
        }
        return Outcome::Filled(id);
    }
    Outcome::Surplus
}

fn enrich(entity: &mut Entity, descriptor: &WebDescriptor) {
    if entity.description.is_none() {
        entity.description = descriptor.description.clone();
    }
    entity.attributes.extend(
        descriptor
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
}

/// Non-affix categories have one scope. An affix goes to the namespace that
/// already holds its name, else to the keyword/default classification.
fn resolve_scope(
    dataset: &Dataset,
    descriptor: &WebDescriptor,
    sets: &NamespaceSets,
    report: &mut ReconcileReport,
    ctx: &mut BuildContext,
) -> Scope {
    if descriptor.category != Category::Affix {
        return Scope::of(descriptor.category);
    }
    let named: Vec<Namespace> = Namespace::ALL
        .into_iter()
        .filter(|ns| dataset.find_by_name(Scope::affix(*ns), &descriptor.name).is_some())
        .collect();
    match named.as_slice() {
        [only] => Scope::affix(*only),
        [first, ..] => {
            let chosen = descriptor
                .namespace_hint
                .filter(|hint| named.contains(hint))
                .unwrap_or(*first);
            Scope::affix(chosen)
        }
        [] => {
            let classification = classify(None, descriptor.namespace_hint, sets);
            if classification.source != ClassificationSource::Authoritative {
                report.heuristic_scopes += 1;
                ctx.stats.data_quality(
                    Stage::Reconcile,
                    format!(
                        "affix {:?} from {} has no name match; {:?} classification chose {}",
                        descriptor.name,
                        descriptor.source,
                        classification.source,
                        classification.namespace
                    ),
                );
            }
            Scope::affix(classification.namespace)
        }
    }
}

fn closest_name(dataset: &Dataset, scope: Scope, name: &str) -> Option<(u32, String)> {
    dataset
        .entities(scope)
        .filter_map(|e| e.name.as_deref().map(|n| (e.id, n)))
        .map(|(id, candidate)| (id, candidate, strsim::jaro_winkler(name, candidate)))
        .filter(|(_, _, score)| *score >= CLOSE_NAME_THRESHOLD)
        .fold(None, |best: Option<(u32, &str, f64)>, current| match best {
            Some(b) if b.2 >= current.2 => Some(b),
            _ => Some(current),
        })
        .map(|(id, candidate, _)| (id, candidate.to_string()))
}
