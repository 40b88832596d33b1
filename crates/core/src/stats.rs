use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Gate,
    Templates,
    Namespace,
    Web,
    Reconcile,
    Overrides,
    Validate,
    Write,
    Index,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Gate => "gate",
            Stage::Templates => "templates",
            Stage::Namespace => "namespace",
            Stage::Web => "web",
            Stage::Reconcile => "reconcile",
            Stage::Overrides => "overrides",
            Stage::Validate => "validate",
            Stage::Write => "write",
            Stage::Index => "index",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A record or document was skipped; the stage carried on.
    Warning,
    /// Duplicate names, unresolved placeholders, unclassified namespaces.
    DataQuality,
    /// A scraped record with no template slot left to take it.
    Surplus,
    /// An authoritative source was missing and a heuristic took over.
    Degraded,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Warning => "warning",
            IssueKind::DataQuality => "data-quality",
            IssueKind::Surplus => "surplus",
            IssueKind::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub stage: Stage,
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.kind.as_str(), self.message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounters {
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueTally {
    pub warnings: usize,
    pub data_quality: usize,
    pub surplus: usize,
    pub degraded: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    issues: Vec<Issue>,
    counters: BTreeMap<Stage, StageCounters>,
}

impl BuildStats {
    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage = stage.as_str(), "{message}");
        self.push(stage, IssueKind::Warning, message);
    }

    pub fn data_quality(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(stage = stage.as_str(), "{message}");
        self.push(stage, IssueKind::DataQuality, message);
    }

    pub fn surplus(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage = stage.as_str(), "{message}");
        self.push(stage, IssueKind::Surplus, message);
    }

    pub fn degraded(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage = stage.as_str(), "{message}");
        self.push(stage, IssueKind::Degraded, message);
    }

    fn push(&mut self, stage: Stage, kind: IssueKind, message: String) {
        self.issues.push(Issue {
            stage,
            kind,
            message,
        });
    }

    pub fn add_ok(&mut self, stage: Stage) {
        self.counters.entry(stage).or_default().ok += 1;
    }

    pub fn add_skip(&mut self, stage: Stage) {
        self.counters.entry(stage).or_default().skipped += 1;
    }

    pub fn add_fail(&mut self, stage: Stage) {
        self.counters.entry(stage).or_default().failed += 1;
    }

    pub fn counters(&self, stage: Stage) -> StageCounters {
        self.counters.get(&stage).copied().unwrap_or_default()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn tally(&self) -> IssueTally {
        IssueTally {
            warnings: self.count(IssueKind::Warning),
            data_quality: self.count(IssueKind::DataQuality),
            surplus: self.count(IssueKind::Surplus),
            degraded: self.count(IssueKind::Degraded),
        }
    }

    /// Full build log, one issue per line, preceded by per-stage counters.
    pub fn render_log(&self) -> String {
        let mut lines = Vec::new();
        for (stage, counters) in &self.counters {
            lines.push(format!(
                "stage {stage}: ok={} skipped={} failed={}",
                counters.ok, counters.skipped, counters.failed
            ));
        }
        lines.extend(self.issues.iter().map(|issue| issue.to_string()));
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Console-sized view: the first `limit` issues plus a remainder count.
    pub fn console_summary(&self, limit: usize) -> Vec<String> {
        let tally = self.tally();
        let mut lines = vec![format!(
            "{} issues (warnings={} data-quality={} surplus={} degraded={})",
            self.issues.len(),
            tally.warnings,
            tally.data_quality,
            tally.surplus,
            tally.degraded
        )];
        lines.extend(self.issues.iter().take(limit).map(|i| format!("  {i}")));
        if self.issues.len() > limit {
            lines.push(format!(
                "  ... and {} more (see build.log)",
                self.issues.len() - limit
            ));
        }
        lines
    }
}

#[derive(Debug, Clone)]
pub struct BuildContext {
    pub stats: BuildStats,
    pub started_at: DateTime<Utc>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self {
            stats: BuildStats::default(),
            started_at,
        }
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}
