mod card;
mod parsers;
mod tiers;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use scraper::Html;

pub use card::{extract_cards, read_card, Card, CardError};
pub use parsers::{describe, snake_case, stat_value, DEFAULT_SKILL_CLASS};
pub use tiers::{
    extract_tiers, normalize_range, GridStrategy, LegacyTextStrategy, TableStrategy, TierColumn,
    TierStrategy, TierTable, STRATEGIES,
};

use crate::model::{Attributes, Category, Namespace};
use crate::sources::SourceLayout;
use crate::stats::{BuildContext, Stage};

#[derive(Debug, Clone, PartialEq)]
pub struct WebDescriptor {
    pub category: Category,
    pub name: String,
    pub description: Option<String>,
    pub attributes: Attributes,
    pub namespace_hint: Option<Namespace>,
    /// `<file>#<card index>`, for log lines.
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct WebBatch {
    pub descriptors: Vec<WebDescriptor>,
    /// Vocabulary from skill, ailment and monster tags.
    pub tags: BTreeSet<String>,
}

impl WebBatch {
    pub fn of(&self, category: Category) -> impl Iterator<Item = &WebDescriptor> {
        self.descriptors.iter().filter(move |d| d.category == category)
    }

    fn push(&mut self, descriptor: WebDescriptor) {
        if descriptor.category.collects_tags() {
            if let Some(tags) = descriptor.attributes.get("tags").and_then(|t| t.as_array()) {
                self.tags
                    .extend(tags.iter().filter_map(|t| t.as_str()).map(str::to_string));
            }
        }
        self.descriptors.push(descriptor);
    }
}

/// Reads every category directory in a fixed order. Missing or unreadable
/// directories contribute nothing.
pub fn ingest_web(sources: &SourceLayout, ctx: &mut BuildContext) -> WebBatch {
    let mut batch = WebBatch::default();
    for category in Category::ALL {
        let dir = sources.web_category_dir(category);
        if !dir.is_dir() {
            tracing::debug!(stage = "web", "no scraped pages for {category} at {}", dir.display());
            continue;
        }
        for path in category_pages(&dir, ctx) {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) => {
                    ctx.stats.add_fail(Stage::Web);
                    ctx.stats.warn(
                        Stage::Web,
                        format!("skipping unreadable page {}: {err}", path.display()),
                    );
                    continue;
                }
            };
            let label = relative_label(sources.root(), &path);
            for descriptor in parse_document(category, &raw, &label, ctx) {
                batch.push(descriptor);
            }
        }
    }
    tracing::info!(
        stage = "web",
        "scraped {} records, {} vocabulary tags",
        batch.descriptors.len(),
        batch.tags.len()
    );
    batch
}

pub fn parse_document(
    category: Category,
    raw: &str,
    label: &str,
    ctx: &mut BuildContext,
) -> Vec<WebDescriptor> {
    let document = Html::parse_document(raw);
    let mut out = Vec::new();
    for (idx, element) in extract_cards(&document).into_iter().enumerate() {
        let source = format!("{label}#{idx}");
        match read_card(element) {
            Ok(card) => {
                ctx.stats.add_ok(Stage::Web);
                out.push(describe(category, card, source));
            }
            Err(err) => {
                ctx.stats.add_skip(Stage::Web);
                ctx.stats.warn(Stage::Web, format!("skipping {category} card {source}: {err}"));
            }
        }
    }
    out
}

fn category_pages(dir: &Path, ctx: &mut BuildContext) -> Vec<PathBuf> {
    match html_files(dir) {
        Ok(files) => files,
        Err(err) => {
            ctx.stats.add_fail(Stage::Web);
            ctx.stats.warn(
                Stage::Web,
                format!("skipping unreadable directory {}: {err}", dir.display()),
            );
            Vec::new()
        }
    }
}

fn html_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_html = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "html" | "htm"))
            .unwrap_or(false);
        if is_html && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn relative_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
