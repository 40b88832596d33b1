use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use refforge_core::{
    build_database, check_gate, BuildContext, BuildRequest, GateDecision, IssueKind, RunReason,
    SourceLayout,
};
use refforge_index::{read_json, write_json_atomic, OutputLayout, Partition, VersionRecord};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use walkdir::WalkDir;

const MASTER: &str = r#"<ItemFilter>
  <colors><Color id="1" name="Red"/><Color id="2" name="Gold"/></colors>
  <sounds><Sound id="1" name="Chime"/></sounds>
  <beams><Beam id="4" name="Tall"/></beams>
  <rules>
    <Rule>
      <nameOverride>All Idol Affixes</nameOverride>
      <conditions><Condition type="AffixCondition"><affixes><int>1</int><int>2</int></affixes></Condition></conditions>
    </Rule>
    <Rule>
      <nameOverride>All Item Affixes</nameOverride>
      <conditions><Condition type="AffixCondition"><affixes><int>7</int><int>8</int><int>9</int></affixes></Condition></conditions>
    </Rule>
    <Rule><nameOverride>Affix 1</nameOverride></Rule>
    <Rule>
      <nameOverride>Of the Omen</nameOverride>
      <conditions><Condition type="AffixCondition"><affixes><int>2</int></affixes></Condition></conditions>
    </Rule>
    <Rule>
      <nameOverride>Crit Avoid</nameOverride>
      <conditions><Condition type="AffixCondition"><affixes><int>7</int></affixes></Condition></conditions>
    </Rule>
    <Rule><nameOverride>Affix 8</nameOverride></Rule>
    <Rule><nameOverride>Affix 9</nameOverride></Rule>
    <Rule><nameOverride>Unique 42</nameOverride></Rule>
    <Rule><nameOverride>Unique 60</nameOverride></Rule>
    <Rule>
      <nameOverride>Fireball</nameOverride>
      <conditions><Condition type="SkillCondition"><id>3</id></Condition></conditions>
    </Rule>
    <Rule><nameOverride>Skill 4</nameOverride></Rule>
    <Rule>
      <nameOverride>Void Beast</nameOverride>
      <conditions><Condition type="MonsterCondition"><id>1</id></Condition></conditions>
    </Rule>
  </rules>
</ItemFilter>"#;

const UNIQUES: &str = r#"<html><body>
  <div class="card">
    <h3 class="card-title">Inferno Ring</h3>
    <div class="card-type">Unique Ruby Ring</div>
    <div class="card-description">Burns what it touches.</div>
  </div>
  <div class="card">
    <h3 class="card-title">Inferno Ring</h3>
    <ul class="card-stats"><li>Level Requirement: 30</li></ul>
  </div>
</body></html>"#;

const AFFIXES: &str = r#"<html><body>
  <div class="card">
    <h3 class="card-title">Of the Omen</h3>
    <div class="card-type">Idol Suffix</div>
    <table class="tier-table">
      <tr><th>Tier</th><th>Damage</th></tr>
      <tr><td>Tier 1</td><td>5-10</td></tr>
      <tr><td>Tier 2</td><td>11 – 15</td></tr>
    </table>
  </div>
  <div class="card">
    <h3 class="card-title">Of Haste</h3>
    <div class="card-type">Boots Suffix</div>
    <ul><li>T1: 4, 6</li></ul>
  </div>
  <div class="card">
    <h3 class="card-title">Crit Avoid</h3>
    <div class="card-type">Body Armor Prefix</div>
  </div>
</body></html>"#;

const SKILLS: &str = r#"<html><body>
  <div class="card">
    <h3 class="card-title">Fireball</h3>
    <ul class="card-stats"><li>Class: Mage</li></ul>
    <div class="card-tags"><span class="tag">Fire</span><span class="tag">Spell</span></div>
  </div>
  <div class="card">
    <h3 class="card-title">Frost Wall</h3>
    <div class="card-tags"><span class="tag">Cold</span></div>
  </div>
</body></html>"#;

const MONSTERS: &str = r#"<html><body>
  <div class="card"><h3 class="card-title">Void Beast</h3><div class="card-type">Rare</div></div>
  <div class="card"><h3 class="card-title">Ghost Wolf</h3></div>
</body></html>"#;

const AILMENTS: &str = r#"<div class="card"><p>title went missing</p></div>"#;

struct Fixture {
    _dir: TempDir,
    request: BuildRequest,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let sources = SourceLayout::new(dir.path().join("data"));
    write(&sources.templates_dir().join("master.xml"), MASTER);
    write(&sources.web_dir().join("uniques/rings.html"), UNIQUES);
    write(&sources.web_dir().join("affixes/affixes.html"), AFFIXES);
    write(&sources.web_dir().join("skills/skills.html"), SKILLS);
    write(&sources.web_dir().join("monsters/monsters.html"), MONSTERS);
    write(&sources.web_dir().join("ailments/ailments.html"), AILMENTS);
    write(
        &sources.overrides_dir().join("affixes.json"),
        r#"{"overrides": {"7": {"name": "Critical Strike Avoidance"}}}"#,
    );
    write(
        &sources.analytics_file(),
        r#"{"42": {"archetypes": ["Ignite Mage"], "damageTypes": ["Fire"]}}"#,
    );
    let request = BuildRequest {
        sources,
        layout: OutputLayout::new(dir.path().join("database")),
        version: "1.2.0".to_string(),
        suspicious_markers: refforge_core::default_markers(),
    };
    Fixture { _dir: dir, request }
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn partition(layout: &OutputLayout, partition: Partition) -> Value {
    read_json(&layout.partition_file(partition).unwrap()).unwrap()
}

fn record(records: &Value, id: u64) -> Value {
    records
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == json!(id))
        .cloned()
        .unwrap_or(Value::Null)
}

#[test]
fn placeholder_is_consumed_once_then_matched_by_name() {
    let fx = fixture();
    let mut ctx = BuildContext::new();
    build_database(&fx.request, &mut ctx).unwrap();

    let uniques = partition(&fx.request.layout, Partition::Unique);
    let ring = record(&uniques, 42);
    assert_eq!(ring["name"], json!("Inferno Ring"));
    assert_eq!(ring["base_type"], json!("Ruby Ring"));
    assert_eq!(ring["level_requirement"], json!(30));
    assert_eq!(ring["description"], json!("Burns what it touches."));
    assert_eq!(record(&uniques, 60)["name"], Value::Null);
}

#[test]
fn override_wins_over_reconciled_affix() {
    let fx = fixture();
    let mut ctx = BuildContext::new();
    build_database(&fx.request, &mut ctx).unwrap();

    let items = partition(&fx.request.layout, Partition::AffixItem);
    assert_eq!(
        record(&items, 7),
        json!({"id": 7, "name": "Critical Strike Avoidance"})
    );
    let haste = record(&items, 8);
    assert_eq!(haste["name"], json!("Of Haste"));
    assert_eq!(haste["attributes"]["tiers"]["columns"][1]["values"], json!(["6"]));

    let idols = partition(&fx.request.layout, Partition::AffixIdol);
    let omen = record(&idols, 2);
    assert_eq!(
        omen["attributes"]["tiers"],
        json!({"tiers": ["T1", "T2"], "columns": [{"header": "Damage", "values": ["5 to 10", "11 to 15"]}]})
    );
    assert_eq!(record(&idols, 1)["name"], Value::Null);
}

#[test]
fn surplus_and_bad_cards_are_reported_once() {
    let fx = fixture();
    let mut ctx = BuildContext::new();
    let summary = build_database(&fx.request, &mut ctx).unwrap();

    let surplus: Vec<_> = ctx
        .stats
        .issues()
        .iter()
        .filter(|i| i.kind == IssueKind::Surplus)
        .collect();
    assert_eq!(surplus.len(), 1);
    assert!(surplus[0].message.contains("Ghost Wolf"));
    assert_eq!(summary.reconcile.surplus, 1);

    let monsters = partition(&fx.request.layout, Partition::Monster);
    assert_eq!(monsters.as_array().unwrap().len(), 1);
    assert_eq!(record(&monsters, 1)["attributes"]["monster_type"], json!("Rare"));

    let log = fs::read_to_string(fx.request.layout.build_log()).unwrap();
    assert_eq!(log.matches("Ghost Wolf").count(), 1);
    assert!(log.contains("card has no title"));
}

#[test]
fn skills_split_by_class_and_indexes_follow() {
    let fx = fixture();
    let layout = &fx.request.layout;
    let mut ctx = BuildContext::new();
    let summary = build_database(&fx.request, &mut ctx).unwrap();

    let mage: Value = read_json(&layout.skills_dir().join("mage.json")).unwrap();
    assert_eq!(mage[0]["name"], json!("Fireball"));
    let general: Value = read_json(&layout.skills_dir().join("general.json")).unwrap();
    assert_eq!(general[0]["id"], json!(4));

    let tags: Value = read_json(&layout.tags()).unwrap();
    assert_eq!(tags, json!(["Cold", "Fire", "Spell"]));
    let reference: Value = read_json(&layout.reference()).unwrap();
    assert_eq!(reference["colors"]["2"], json!("Gold"));

    let tag_index: Value = read_json(&layout.index_file("tag_index.json")).unwrap();
    assert_eq!(tag_index["Fire"]["skill"], json!([3]));
    let xref: Value = read_json(&layout.index_file("unique_cross_reference.json")).unwrap();
    assert_eq!(xref["by_archetype"]["ignite mage"], json!([42]));
    assert_eq!(summary.index.analytics_entries, 1);
    assert_eq!(summary.version.counts["unique"], 2);
}

#[test]
fn malformed_analytics_overlay_only_costs_the_cross_reference() {
    let fx = fixture();
    let layout = &fx.request.layout;
    write(&fx.request.sources.analytics_file(), "{ not json");
    let mut ctx = BuildContext::starting_at(Utc::now() + Duration::seconds(5));
    let summary = build_database(&fx.request, &mut ctx).unwrap();

    assert_eq!(summary.index.analytics_entries, 0);
    let xref: Value = read_json(&layout.index_file("unique_cross_reference.json")).unwrap();
    assert_eq!(xref["by_archetype"], json!({}));
    let record: VersionRecord = read_json(&layout.version()).unwrap();
    assert_eq!(record.version, "1.2.0");
    let log = fs::read_to_string(layout.build_log()).unwrap();
    assert!(log.contains("analytics overlay"));
    assert!(matches!(
        check_gate(&fx.request.sources, layout, false).unwrap(),
        GateDecision::Skip { .. }
    ));
}

#[test]
fn ids_are_unique_within_each_partition() {
    let fx = fixture();
    let layout = &fx.request.layout;
    let mut ctx = BuildContext::new();
    build_database(&fx.request, &mut ctx).unwrap();

    let mut files: Vec<PathBuf> = Partition::ALL
        .iter()
        .filter_map(|p| layout.partition_file(*p))
        .collect();
    files.extend(
        fs::read_dir(layout.skills_dir())
            .unwrap()
            .map(|e| e.unwrap().path()),
    );
    let mut skill_ids = Vec::new();
    for path in files {
        let records: Value = read_json(&path).unwrap();
        let ids: Vec<u64> = records
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "{} not strictly sorted", path.display());
        if path.starts_with(layout.skills_dir()) {
            skill_ids.extend(ids);
        }
    }
    let total = skill_ids.len();
    skill_ids.sort_unstable();
    skill_ids.dedup();
    assert_eq!(skill_ids.len(), total);
}

#[test]
fn forced_rebuild_is_byte_identical() {
    let fx = fixture();
    let layout = &fx.request.layout;
    build_database(&fx.request, &mut BuildContext::new()).unwrap();
    let first = snapshot(layout.root());
    build_database(&fx.request, &mut BuildContext::new()).unwrap();
    let second = snapshot(layout.root());
    assert_eq!(first.len(), second.len());
    assert_eq!(first, second);
}

/// Every output file except the two that carry the build time.
fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !matches!(e.file_name().to_str(), Some("version.json" | "summary.json")))
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn gate_skips_until_a_source_is_newer() {
    let fx = fixture();
    let layout = &fx.request.layout;
    assert!(matches!(
        check_gate(&fx.request.sources, layout, false).unwrap(),
        GateDecision::Run(RunReason::MissingOutput(_))
    ));

    let mut ctx = BuildContext::starting_at(Utc::now() + Duration::seconds(5));
    build_database(&fx.request, &mut ctx).unwrap();
    assert!(matches!(
        check_gate(&fx.request.sources, layout, false).unwrap(),
        GateDecision::Skip { .. }
    ));

    let mut record: VersionRecord = read_json(&layout.version()).unwrap();
    record.built_at = Utc::now() - Duration::hours(1);
    write_json_atomic(&layout.version(), &record).unwrap();
    assert!(matches!(
        check_gate(&fx.request.sources, layout, false).unwrap(),
        GateDecision::Run(RunReason::SourceNewer(_))
    ));
    assert_eq!(
        check_gate(&fx.request.sources, layout, true).unwrap(),
        GateDecision::Run(RunReason::Forced)
    );
}

#[test]
fn missing_master_template_aborts_before_writing() {
    let fx = fixture();
    fs::remove_file(fx.request.sources.templates_dir().join("master.xml")).unwrap();
    let err = build_database(&fx.request, &mut BuildContext::new()).unwrap_err();
    assert!(err.is_fatal_template());
    assert!(!fx.request.layout.root().exists());
}
