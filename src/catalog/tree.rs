use crate::catalog::{Category, CategoryRecord};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Derives `level` and `path` from the parent chain. Records with a missing
/// parent or on a cycle are dropped. Output is ordered by level, keeping the
/// input order within a level.
pub fn hydrate(records: Vec<CategoryRecord>) -> Vec<Category> {
    let by_id: HashMap<&str, &CategoryRecord> = records
        .iter()
        .map(|record| (record.id.as_str(), record))
        .collect();

    let mut categories = Vec::with_capacity(records.len());
    for record in &records {
        match lineage(record, &by_id) {
            Some(path) => categories.push(Category {
                id: record.id.clone(),
                name: record.name.trim().to_string(),
                parent_id: parent_of(record).map(str::to_string),
                level: (path.len() - 1) as u32,
                path,
            }),
            None => warn!(
                target = "maison.catalog",
                category_id = %record.id,
                name = %record.name,
                "category_dropped_broken_lineage"
            ),
        }
    }
    categories.sort_by_key(|category| category.level);
    categories
}

fn parent_of(record: &CategoryRecord) -> Option<&str> {
    record
        .parent_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn lineage(record: &CategoryRecord, by_id: &HashMap<&str, &CategoryRecord>) -> Option<Vec<String>> {
    let mut path = vec![record.name.trim().to_string()];
    let mut seen = HashSet::from([record.id.as_str()]);
    let mut current = parent_of(record);
    while let Some(parent_id) = current {
        if !seen.insert(parent_id) {
            return None;
        }
        let parent = by_id.get(parent_id)?;
        path.push(parent.name.trim().to_string());
        current = parent_of(parent);
    }
    path.reverse();
    Some(path)
}
