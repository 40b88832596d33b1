use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use refforge_core::{
    assemble, build_database, check_gate, BuildContext, BuildRequest, BuildStats, BuildSummary,
    GateDecision, SourceLayout,
};
use refforge_index::{load_summary, read_json, OutputLayout, VersionRecord};

use crate::config::RunConfig;
use crate::logging;

const CONSOLE_ISSUE_LIMIT: usize = 10;

#[derive(Debug)]
pub enum BuildOutcome {
    Skipped { built_at: DateTime<Utc> },
    Built { summary: Box<BuildSummary>, stats: BuildStats },
}

pub fn build(cfg: RunConfig, force: bool, stamp: Option<String>) -> Result<()> {
    let request = cfg.request(stamp);
    match run_build(&request, force, check_gate, build_database)? {
        BuildOutcome::Skipped { built_at } => {
            logging::stage(
                "gate",
                format!("up to date (built {built_at}); use --force to rebuild"),
            );
        }
        BuildOutcome::Built { summary, stats } => print_summary(&request, &summary, &stats),
    }
    Ok(())
}

fn run_build<FGate, FBuild>(
    request: &BuildRequest,
    force: bool,
    gate_fn: FGate,
    build_fn: FBuild,
) -> Result<BuildOutcome>
where
    FGate: Fn(&SourceLayout, &OutputLayout, bool) -> refforge_core::Result<GateDecision>,
    FBuild: Fn(&BuildRequest, &mut BuildContext) -> refforge_core::Result<BuildSummary>,
{
    let decision = gate_fn(&request.sources, &request.layout, force)
        .context("build gate failed")?;
    let reason = match decision {
        GateDecision::Skip { built_at } => return Ok(BuildOutcome::Skipped { built_at }),
        GateDecision::Run(reason) => reason,
    };
    tracing::info!(stage = "gate", "building: {reason}");
    let mut ctx = BuildContext::new();
    match build_fn(request, &mut ctx) {
        Ok(summary) => Ok(BuildOutcome::Built {
            summary: Box::new(summary),
            stats: ctx.stats,
        }),
        Err(err) => {
            for line in ctx.stats.console_summary(CONSOLE_ISSUE_LIMIT) {
                logging::stage("build", line);
            }
            Err(err).context("build failed")
        }
    }
}

fn print_summary(request: &BuildRequest, summary: &BuildSummary, stats: &BuildStats) {
    logging::stage(
        "build",
        format!(
            "database {} written to {}",
            summary.version.version,
            request.layout.root().display()
        ),
    );
    for (partition, count) in &summary.version.counts {
        logging::stage("build", format!("  {partition}: {count}"));
    }
    logging::stage(
        "build",
        format!(
            "reconcile: {} merged, {} filled, {} surplus; overrides: {} applied, {} corrections",
            summary.reconcile.merged,
            summary.reconcile.filled,
            summary.reconcile.surplus,
            summary.overrides.overrides,
            summary.overrides.corrections
        ),
    );
    logging::stage(
        "validate",
        format!(
            "{} duplicates, {} placeholders, {} suspicious names",
            summary.report.duplicate_count(),
            summary.report.placeholder_count(),
            summary.report.suspicious_count()
        ),
    );
    for line in stats.console_summary(CONSOLE_ISSUE_LIMIT) {
        logging::stage("issues", line);
    }
}

pub fn info(cfg: &RunConfig) -> Result<()> {
    let layout = cfg.output_layout();
    let version: VersionRecord = read_json(&layout.version()).with_context(|| {
        format!("no database found under {}", layout.root().display())
    })?;
    println!("version: {}", version.version);
    println!("built at: {}", version.built_at);
    println!("generator: {}", version.generator);
    println!("source fingerprint: {}", version.source_fingerprint);
    for (partition, count) in &version.counts {
        println!("  {partition}: {count}");
    }
    match load_summary(&layout) {
        Ok(summary) => {
            println!(
                "indexes: {} tags ({} in vocabulary), {} mechanics, {} analytics entries",
                summary.indexed_tags,
                summary.vocabulary_tags,
                summary.mechanics,
                summary.analytics_entries
            );
        }
        Err(err) => tracing::warn!("index summary unavailable: {err:#}"),
    }
    Ok(())
}

/// Ingestion through validation; nothing is written.
pub fn validate_only(cfg: &RunConfig) -> Result<()> {
    let mut ctx = BuildContext::new();
    let assembled = assemble(&cfg.source_layout(), &cfg.suspicious_markers, &mut ctx)
        .context("validation run failed")?;
    print!("{}", assembled.report.render_markdown());
    for line in ctx.stats.console_summary(CONSOLE_ISSUE_LIMIT) {
        logging::stage("issues", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use refforge_core::{RefError, RunReason};
    use std::cell::Cell;
    use std::fs;
    use tempfile::tempdir;

    fn config(root: &std::path::Path) -> RunConfig {
        let cfg = RunConfig {
            sources: root.join("data"),
            output: root.join("database"),
            ..RunConfig::default()
        };
        let templates = cfg.source_layout().templates_dir();
        fs::create_dir_all(&templates).unwrap();
        fs::write(
            templates.join("master.xml"),
            "<ItemFilter><rules><Rule><nameOverride>Monster 1</nameOverride></Rule></rules></ItemFilter>",
        )
        .unwrap();
        cfg
    }

    #[test]
    fn skip_decision_never_runs_the_build() {
        let dir = tempdir().unwrap();
        let request = config(dir.path()).request(None);
        let calls = Cell::new(0);
        let outcome = run_build(
            &request,
            false,
            |_, _, _| Ok(GateDecision::Skip { built_at: Utc::now() }),
            |_, _| {
                calls.set(calls.get() + 1);
                Err(RefError::Other("unreachable".into()))
            },
        )
        .unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped { .. }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn force_is_passed_to_the_gate() {
        let dir = tempdir().unwrap();
        let request = config(dir.path()).request(Some("9.9".into()));
        let result = run_build(
            &request,
            true,
            |_, _, force| {
                assert!(force);
                Ok(GateDecision::Run(RunReason::Forced))
            },
            build_database,
        )
        .unwrap();
        match result {
            BuildOutcome::Built { summary, .. } => assert_eq!(summary.version.version, "9.9"),
            other => panic!("expected a build, got {other:?}"),
        }
    }

    #[test]
    fn second_run_is_skipped_by_the_gate() {
        let dir = tempdir().unwrap();
        let request = config(dir.path()).request(None);
        let first = run_build(&request, false, check_gate, build_database).unwrap();
        assert!(matches!(first, BuildOutcome::Built { .. }));
        let second = run_build(&request, false, check_gate, build_database).unwrap();
        assert!(matches!(second, BuildOutcome::Skipped { .. }));
    }

    #[test]
    fn validate_only_writes_nothing() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        validate_only(&cfg).unwrap();
        assert!(!cfg.output.exists());
    }

    #[test]
    fn info_requires_a_database() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        assert!(info(&cfg).is_err());
        build(cfg.clone(), false, None).unwrap();
        info(&cfg).unwrap();
    }
}
