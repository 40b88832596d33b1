// Three generations of tier markup, one strategy each. The first strategy
// that yields a tier wins.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::card::text_of;

static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?\d+(?:\.\d+)?%?)\s*(?:-|–|—|to)\s*([+-]?\d+(?:\.\d+)?%?)$")
        .expect("valid regex")
});
static TIER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:tier\s*|t)(\d+)\s*$").expect("valid regex"));
static LEGACY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:tier\s*|t)(\d+)\s*[:\-–]\s*(.+)$").expect("valid regex")
});

static TIER_TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.tier-table").expect("valid selector"));
static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").expect("valid selector"));
static LOW: Lazy<Selector> = Lazy::new(|| Selector::parse(".low").expect("valid selector"));
static HIGH: Lazy<Selector> = Lazy::new(|| Selector::parse(".high").expect("valid selector"));
static GRID_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tier-row").expect("valid selector"));
static GRID_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tier-name").expect("valid selector"));
static GRID_VALUE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tier-value").expect("valid selector"));
static LEGACY_BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li, p, pre").expect("valid selector"));
const LEGACY_TAGS: [&str; 3] = ["li", "p", "pre"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierColumn {
    pub header: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    pub tiers: Vec<String>,
    pub columns: Vec<TierColumn>,
}

impl TierTable {
    fn push_row(&mut self, tier: String, cells: Vec<(String, String)>) {
        let row = self.tiers.len();
        self.tiers.push(tier);
        let mut used: Vec<String> = Vec::new();
        for (header, value) in cells {
            let header = distinct_header(&used, header);
            used.push(header.clone());
            let idx = match self.columns.iter().position(|c| c.header == header) {
                Some(idx) => idx,
                None => {
                    self.columns.push(TierColumn {
                        header,
                        values: vec![String::new(); row],
                    });
                    self.columns.len() - 1
                }
            };
            self.columns[idx].values.push(value);
        }
        for column in &mut self.columns {
            column.values.resize(row + 1, String::new());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    fn has_tier(&self, tier: &str) -> bool {
        self.tiers.iter().any(|t| t == tier)
    }

    pub fn to_value(&self) -> Value {
        let columns: Vec<Value> = self
            .columns
            .iter()
            .map(|c| json!({"header": c.header, "values": c.values}))
            .collect();
        json!({"tiers": self.tiers, "columns": columns})
    }
}

pub trait TierStrategy {
    fn name(&self) -> &'static str;
    fn extract(&self, card: ElementRef<'_>) -> Option<TierTable>;
}

/// `<table>` with a header row; first column is the tier label.
pub struct TableStrategy;

/// `.tier-row` blocks with `.tier-name` and `.tier-value` children.
pub struct GridStrategy;

/// Flat `Tier 1: 5-10, 2` lines.
pub struct LegacyTextStrategy;

pub const STRATEGIES: &[&dyn TierStrategy] = &[&TableStrategy, &GridStrategy, &LegacyTextStrategy];

impl TierStrategy for TableStrategy {
    fn name(&self) -> &'static str {
        "table"
    }

    fn extract(&self, card: ElementRef<'_>) -> Option<TierTable> {
        card.select(&TIER_TABLE)
            .chain(card.select(&TABLE))
            .find_map(read_table)
    }
}

fn read_table(table: ElementRef<'_>) -> Option<TierTable> {
    let mut rows = table.select(&ROW);
    let headers: Vec<String> = rows.next()?.select(&CELL).map(text_of).collect();
    if headers.len() < 2 {
        return None;
    }
    let mut out = TierTable::default();
    for row in rows {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        let Some((label, values)) = cells.split_first() else {
            continue;
        };
        let label = text_of(*label);
        if label.is_empty() {
            continue;
        }
        let cells = headers[1..]
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let value = values.get(idx).map(|c| cell_value(*c)).unwrap_or_default();
                (header.clone(), value)
            })
            .collect();
        out.push_row(tier_label(&label), cells);
    }
    (!out.is_empty()).then_some(out)
}

impl TierStrategy for GridStrategy {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn extract(&self, card: ElementRef<'_>) -> Option<TierTable> {
        let mut out = TierTable::default();
        for row in card.select(&GRID_ROW) {
            let Some(name) = row.select(&GRID_NAME).next().map(text_of) else {
                continue;
            };
            let cells = row
                .select(&GRID_VALUE)
                .enumerate()
                .map(|(idx, value)| {
                    let header = value
                        .value()
                        .attr("data-column")
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Value {}", idx + 1));
                    (header, cell_value(value))
                })
                .collect();
            out.push_row(tier_label(&name), cells);
        }
        (!out.is_empty()).then_some(out)
    }
}

impl TierStrategy for LegacyTextStrategy {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn extract(&self, card: ElementRef<'_>) -> Option<TierTable> {
        let mut out = TierTable::default();
        for block in card.select(&LEGACY_BLOCK) {
            let raw = own_text(block);
            for line in raw.lines() {
                let Some(caps) = LEGACY_LINE.captures(line) else {
                    continue;
                };
                let tier = format!("T{}", &caps[1]);
                if out.has_tier(&tier) {
                    continue;
                }
                let cells = caps[2]
                    .split([',', '/', ';'])
                    .map(normalize_range)
                    .filter(|v| !v.is_empty())
                    .enumerate()
                    .map(|(idx, v)| (format!("Value {}", idx + 1), v))
                    .collect();
                out.push_row(tier, cells);
            }
        }
        (!out.is_empty()).then_some(out)
    }
}

/// Text of `block` minus any nested legacy block, which is read on its own.
fn own_text(block: ElementRef<'_>) -> String {
    block
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let owner = node.ancestors().find(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| LEGACY_TAGS.contains(&e.name()))
            })?;
            (owner.id() == block.id()).then_some(&**text)
        })
        .collect()
}

fn distinct_header(used: &[String], header: String) -> String {
    let mut candidate = header.clone();
    let mut n = 1;
    while used.contains(&candidate) {
        n += 1;
        candidate = format!("{header} ({n})");
    }
    candidate
}

/// Runs the strategies in order; returns the table and the strategy name.
pub fn extract_tiers(card: ElementRef<'_>) -> Option<(TierTable, &'static str)> {
    STRATEGIES.iter().find_map(|strategy| {
        let table = strategy.extract(card)?;
        tracing::debug!(stage = "web", strategy = strategy.name(), "tier table extracted");
        Some((table, strategy.name()))
    })
}

/// `5-10`, `5 – 10` and `5 to 10` all become `5 to 10`.
pub fn normalize_range(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match RANGE.captures(&collapsed) {
        Some(caps) => format!("{} to {}", &caps[1], &caps[2]),
        None => collapsed,
    }
}

fn cell_value(cell: ElementRef<'_>) -> String {
    let low = cell.select(&LOW).next().map(text_of);
    let high = cell.select(&HIGH).next().map(text_of);
    match (low, high) {
        (Some(low), Some(high)) => format!("{low} to {high}"),
        _ => normalize_range(&text_of(cell)),
    }
}

fn tier_label(text: &str) -> String {
    match TIER_LABEL.captures(text) {
        Some(caps) => format!("T{}", &caps[1]),
        None => text.trim().to_string(),
    }
}
