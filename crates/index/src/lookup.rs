use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::reader::WrittenDatabase;
use crate::records::{EntityRecord, Partition};

/// partition -> id -> display projection. The id and category are carried by
/// the map structure and left out of the projection itself.
pub type IdLookup = BTreeMap<String, BTreeMap<u32, Value>>;

pub fn build_id_lookup(db: &WrittenDatabase) -> IdLookup {
    let mut lookup = IdLookup::new();
    for partition in Partition::ALL {
        let entries = lookup.entry(partition.as_str().to_string()).or_default();
        for record in db.records(partition) {
            entries.insert(record.id, project(partition, record, db));
        }
    }
    lookup
}

fn project(partition: Partition, record: &EntityRecord, db: &WrittenDatabase) -> Value {
    let mut out = Map::new();
    out.insert(
        "name".to_string(),
        record.name.clone().map(Value::String).unwrap_or(Value::Null),
    );
    match partition {
        Partition::AffixIdol | Partition::AffixItem => {
            if let Some(count) = tier_count(record) {
                out.insert("tiers".to_string(), Value::from(count));
            }
        }
        Partition::Unique => copy_field(record, "base_type", &mut out),
        Partition::Set => copy_field(record, "set_name", &mut out),
        Partition::Skill => {
            if let Some(class) = db.skill_classes.get(&record.id) {
                out.insert("class".to_string(), Value::String(class.clone()));
            }
        }
        Partition::Ailment => copy_field(record, "max_stacks", &mut out),
        Partition::Monster => copy_field(record, "monster_type", &mut out),
    }
    Value::Object(out)
}

fn copy_field(record: &EntityRecord, key: &str, out: &mut Map<String, Value>) {
    if let Some(value) = record.attribute(key) {
        out.insert(key.to_string(), value.clone());
    }
}

fn tier_count(record: &EntityRecord) -> Option<usize> {
    record
        .attribute("tiers")
        .and_then(|table| table.get("tiers"))
        .and_then(Value::as_array)
        .map(|tiers| tiers.len())
}
