mod error;
mod gate;
mod model;
mod namespace;
mod overrides;
mod pipeline;
mod reconcile;
mod sources;
mod stats;
mod templates;
mod validate;
pub mod web;
mod writer;

pub use error::{RefError, Result};
pub use gate::{check as check_gate, GateDecision, RunReason};
pub use model::{Attributes, Category, Dataset, Entity, Namespace, Scope};
pub use namespace::{
    aggregate_namespace, classify, keyword_namespace, seed_dataset, Classification,
    ClassificationSource, NamespaceSets,
};
pub use overrides::{
    apply_file, apply_overrides, CorrectionRecord, OverrideFile, OverrideRecord, OverrideReport,
};
pub use pipeline::{assemble, build_database, Assembled, BuildRequest, BuildSummary};
pub use reconcile::{link, reconcile, Outcome, ReconcileReport};
pub use sources::{SourceLayout, ANALYTICS_FILE, OVERRIDES_DIR, TEMPLATES_DIR, WEB_DIR};
pub use stats::{BuildContext, BuildStats, Issue, IssueKind, IssueTally, Stage, StageCounters};
pub use templates::{
    ingest_templates, parse_placeholder, AggregateRule, TemplateSet, TemplateSlot,
    MASTER_TEMPLATE,
};
pub use validate::{
    default_markers, validate, DuplicateName, PartitionReport, SuspiciousName, ValidationReport,
    DEFAULT_SUSPICIOUS_MARKERS,
};
pub use web::{ingest_web, WebBatch, WebDescriptor};
pub use writer::{write_build_log, write_database, WriteOptions, GENERATOR};
