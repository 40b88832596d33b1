use std::collections::BTreeMap;

use crate::reader::WrittenDatabase;
use crate::records::Partition;

/// tag -> category -> ids
pub type TagIndex = BTreeMap<String, BTreeMap<String, Vec<u32>>>;

/// Inverted index over every record that carries a `tags` array. Categories
/// without tags simply never appear.
pub fn build_tag_index(db: &WrittenDatabase) -> TagIndex {
    let mut index = TagIndex::new();
    for partition in Partition::ALL {
        for record in db.records(partition) {
            for tag in record.tags() {
                let tag = tag.trim();
                if tag.is_empty() {
                    continue;
                }
                index
                    .entry(tag.to_string())
                    .or_default()
                    .entry(partition.category().to_string())
                    .or_default()
                    .push(record.id);
            }
        }
    }
    for categories in index.values_mut() {
        for ids in categories.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
    }
    index
}
