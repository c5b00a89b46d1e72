use crate::collection::Collection;
use crate::document::Document;

use super::eval::{compare_docs, eval_filter, project_fields};
use super::types::{
    DeleteReport, Filter, FindOptions, MAX_LIMIT, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS,
    UpdateDoc, UpdateReport,
};

/// Work counters gathered while executing a find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ExecStats {
    pub index_name: Option<String>,
    pub docs_examined: u64,
    pub keys_examined: u64,
}

pub(crate) fn execute_find(
    col: &Collection,
    filter: &Filter,
    opts: &FindOptions,
) -> (Vec<Document>, ExecStats) {
    let mut stats = ExecStats::default();
    let plan = col.indexes.read().plan(filter);
    let candidates = match plan.and_then(|p| {
        col.indexes.write().lookup(&p).map(|hit| (p.index_name, hit))
    }) {
        Some((name, hit)) => {
            stats.index_name = Some(name);
            stats.keys_examined = hit.keys_examined;
            col.in_natural_order(hit.ids)
        }
        None => col.get_all_documents(),
    };
    stats.docs_examined = candidates.len() as u64;

    let mut docs: Vec<Document> =
        candidates.into_iter().filter(|d| eval_filter(&d.data, filter)).collect();

    if let Some(sort) = &opts.sort {
        if sort.len() > MAX_SORT_FIELDS {
            log::warn!("sort spec too long: {}", sort.len());
        }
        // stable: equal keys keep natural order
        docs.sort_by(|a, b| compare_docs(&a.data, &b.data, sort));
    }

    let skip = opts.skip.unwrap_or(0);
    // the cap applies to a requested limit only; no limit means every match
    let mut docs: Vec<Document> = match opts.limit {
        Some(limit) => docs.into_iter().skip(skip).take(limit.min(MAX_LIMIT)).collect(),
        None => docs.into_iter().skip(skip).collect(),
    };

    if let Some(fields) = &opts.projection {
        let fields: Vec<String> = fields.iter().take(MAX_PROJECTION_FIELDS).cloned().collect();
        for d in &mut docs {
            d.data = project_fields(&d.data, &fields);
        }
    }
    (docs, stats)
}

#[must_use]
pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> Vec<Document> {
    let start = std::time::Instant::now();
    let (docs, stats) = execute_find(col, filter, opts);
    log::debug!(
        target: "plp_bookstore::query",
        "op=find collection={} duration_ms={} used_index={} docs_examined={} result_count={} limit={:?} skip={:?}",
        col.name_str(),
        start.elapsed().as_millis(),
        stats.index_name.as_deref().unwrap_or("none"),
        stats.docs_examined,
        docs.len(),
        opts.limit,
        opts.skip
    );
    docs
}

#[must_use]
pub fn count_docs(col: &Collection, filter: &Filter) -> usize {
    let start = std::time::Instant::now();
    let n = if matches!(filter, Filter::True) {
        col.len()
    } else {
        execute_find(col, filter, &FindOptions::default()).0.len()
    };
    log::debug!(
        target: "plp_bookstore::query",
        "op=count collection={} duration_ms={} result_count={n}",
        col.name_str(),
        start.elapsed().as_millis()
    );
    n
}

/// Apply `update` to the first document (in natural order) matching `filter`.
pub fn update_one(col: &Collection, filter: &Filter, update: &UpdateDoc) -> UpdateReport {
    let first = execute_find(col, filter, &FindOptions { limit: Some(1), ..FindOptions::default() })
        .0
        .into_iter()
        .next();
    let Some(mut doc) = first else {
        log::debug!(target: "plp_bookstore::query", "op=update_one collection={} matched=0", col.name_str());
        return UpdateReport::default();
    };
    let changed = apply_update(&mut doc, update);
    if changed {
        let id = doc.id.clone();
        col.update_document(&id, doc);
    }
    log::debug!(
        target: "plp_bookstore::query",
        "op=update_one collection={} matched=1 modified={}",
        col.name_str(),
        u64::from(changed)
    );
    UpdateReport { matched: 1, modified: u64::from(changed) }
}

/// Delete the first document (in natural order) matching `filter`.
pub fn delete_one(col: &Collection, filter: &Filter) -> DeleteReport {
    let first = execute_find(col, filter, &FindOptions { limit: Some(1), ..FindOptions::default() })
        .0
        .into_iter()
        .next();
    let deleted = first.is_some_and(|d| col.delete_document(&d.id));
    log::debug!(
        target: "plp_bookstore::query",
        "op=delete_one collection={} deleted={deleted}",
        col.name_str()
    );
    DeleteReport { deleted: u64::from(deleted) }
}

/// Apply `$set` pairs; dotted paths create intermediate sub-documents. Returns whether
/// anything changed.
pub fn apply_update(doc: &mut Document, upd: &UpdateDoc) -> bool {
    fn ensure_subdoc<'a>(root: &'a mut bson::Document, key: &str) -> &'a mut bson::Document {
        if !matches!(root.get(key), Some(bson::Bson::Document(_))) {
            root.insert(key.to_string(), bson::Bson::Document(bson::Document::new()));
        }
        match root.get_mut(key) {
            Some(bson::Bson::Document(d)) => d,
            _ => unreachable!("sub-document inserted above"),
        }
    }
    fn set_path(root: &mut bson::Document, path: &str, value: bson::Bson) -> bool {
        let mut cur = root;
        let mut iter = path.split('.').peekable();
        while let Some(seg) = iter.next() {
            if iter.peek().is_none() {
                let old = cur.insert(seg.to_string(), value.clone());
                return old.as_ref() != Some(&value);
            }
            cur = ensure_subdoc(cur, seg);
        }
        false
    }

    let mut changed = false;
    for (k, v) in &upd.set {
        if set_path(&mut doc.data, k, v.clone()) {
            changed = true;
        }
    }
    changed
}
