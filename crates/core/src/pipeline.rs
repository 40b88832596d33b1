use refforge_index::{
    build_indexes, load_overlay, AnalyticsOverlay, IndexSummary, OutputLayout, VersionRecord,
};

use crate::error::Result;
use crate::model::Dataset;
use crate::namespace::{seed_dataset, NamespaceSets};
use crate::overrides::{apply_overrides, OverrideReport};
use crate::reconcile::{reconcile, ReconcileReport};
use crate::sources::SourceLayout;
use crate::stats::{BuildContext, Stage};
use crate::templates::ingest_templates;
use crate::validate::{validate, ValidationReport};
use crate::web::ingest_web;
use crate::writer::{write_build_log, write_database, write_version, WriteOptions};

#[derive(Debug, Clone)]
pub struct Assembled {
    pub dataset: Dataset,
    pub sets: NamespaceSets,
    pub reconcile: ReconcileReport,
    pub overrides: OverrideReport,
    pub report: ValidationReport,
}

/// Only a missing or unparseable master template fails this call.
pub fn assemble(
    sources: &SourceLayout,
    suspicious_markers: &[String],
    ctx: &mut BuildContext,
) -> Result<Assembled> {
    let templates = ingest_templates(&sources.templates_dir(), ctx)?;
    let sets = NamespaceSets::from_templates(&templates, ctx);
    let mut dataset = seed_dataset(&templates, &sets, ctx);

    let batch = ingest_web(sources, ctx);
    dataset.tags = batch.tags.clone();
    let reconcile = reconcile(&mut dataset, &batch.descriptors, &sets, ctx);
    let overrides = apply_overrides(&mut dataset, sources, &sets, ctx);
    let report = validate(&dataset, suspicious_markers, ctx);

    Ok(Assembled {
        dataset,
        sets,
        reconcile,
        overrides,
        report,
    })
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub sources: SourceLayout,
    pub layout: OutputLayout,
    pub version: String,
    pub suspicious_markers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub version: VersionRecord,
    pub index: IndexSummary,
    pub reconcile: ReconcileReport,
    pub overrides: OverrideReport,
    pub report: ValidationReport,
}

/// Assembles, writes and indexes one database. The build gate is the
/// caller's concern. Nothing is written when assembly fails; once writing
/// has started, `build.log` is flushed whether or not the rest succeeds.
pub fn build_database(request: &BuildRequest, ctx: &mut BuildContext) -> Result<BuildSummary> {
    let assembled = assemble(&request.sources, &request.suspicious_markers, ctx)?;
    let result = write_and_index(request, &assembled, ctx);
    write_build_log(&request.layout, &ctx.stats)?;
    let (version, index) = result?;
    Ok(BuildSummary {
        version,
        index,
        reconcile: assembled.reconcile,
        overrides: assembled.overrides,
        report: assembled.report,
    })
}

fn write_and_index(
    request: &BuildRequest,
    assembled: &Assembled,
    ctx: &mut BuildContext,
) -> Result<(VersionRecord, IndexSummary)> {
    let options = WriteOptions {
        version: request.version.clone(),
        built_at: ctx.started_at,
        source_fingerprint: request.sources.fingerprint()?,
    };
    let version = write_database(
        &assembled.dataset,
        &assembled.report,
        &request.layout,
        &options,
        &mut ctx.stats,
    )?;
    let overlay = load_analytics(&request.sources, ctx);
    let index = build_indexes(&request.layout, Some(&version), &overlay)?;
    ctx.stats.add_ok(Stage::Index);
    write_version(&request.layout, &version)?;
    Ok((version, index))
}

/// An unreadable overlay only costs the cross reference.
fn load_analytics(sources: &SourceLayout, ctx: &mut BuildContext) -> AnalyticsOverlay {
    let path = sources.analytics_file();
    match load_overlay(&path) {
        Ok(overlay) => overlay,
        Err(err) => {
            ctx.stats.add_fail(Stage::Index);
            ctx.stats.warn(
                Stage::Index,
                format!("analytics overlay {} ignored: {err:#}", path.display()),
            );
            AnalyticsOverlay::new()
        }
    }
}
