use crate::errors::DbError;
use crate::query::{CmpOp, Filter, Order, get_path};
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Name of the implicit primary-key index every collection reports.
pub const ID_INDEX_NAME: &str = "_id_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKeyField {
    pub field: String,
    pub order: Order,
}

/// A requested index: one or more fields with a direction each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<IndexKeyField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IndexSpec {
    #[must_use]
    pub fn single(field: &str, order: Order) -> Self {
        Self::compound(&[(field, order)])
    }

    #[must_use]
    pub fn compound(keys: &[(&str, Order)]) -> Self {
        Self {
            keys: keys
                .iter()
                .map(|(f, o)| IndexKeyField { field: (*f).to_string(), order: *o })
                .collect(),
            name: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// # Errors
    /// Returns `InvalidArgument` for an empty key list, an empty field name or a repeated field.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.keys.is_empty() {
            return Err(DbError::InvalidArgument("index spec has no keys".into()));
        }
        let mut seen = BTreeSet::new();
        for k in &self.keys {
            if k.field.trim().is_empty() {
                return Err(DbError::InvalidArgument("index key with empty field name".into()));
            }
            if !seen.insert(k.field.as_str()) {
                return Err(DbError::InvalidArgument(format!(
                    "field '{}' appears twice in index spec",
                    k.field
                )));
            }
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DbError::InvalidArgument("index name is empty".into()));
        }
        Ok(())
    }

    /// `title_1`, `author_1_published_year_-1`.
    #[must_use]
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}_{}", k.field, k.order.direction()))
            .collect::<Vec<_>>()
            .join("_")
    }

    #[must_use]
    pub fn resolved_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.default_name())
    }

    #[must_use]
    pub fn leading_field(&self) -> &str {
        self.keys.first().map_or("", |k| k.field.as_str())
    }

    fn is_id_index(&self) -> bool {
        self.keys.len() == 1 && self.keys[0].field == "_id"
    }

    fn same_keys(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub build_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Bool(bool),
    Num(OrderedFloat<f64>),
    Str(String),
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn key_from_bson(v: &Bson) -> Option<IndexKey> {
    match v {
        Bson::String(s) => Some(IndexKey::Str(s.clone())),
        Bson::Int32(i) => Some(IndexKey::Num(OrderedFloat(f64::from(*i)))),
        Bson::Int64(i) => Some(IndexKey::Num(OrderedFloat(*i as f64))),
        Bson::Double(f) if !f.is_nan() => Some(IndexKey::Num(OrderedFloat(*f))),
        Bson::Boolean(b) => Some(IndexKey::Bool(*b)),
        _ => None,
    }
}

// Range bounds confined to the key's own type, matching filter semantics.
fn bounds_for(op: CmpOp, key: IndexKey) -> (Bound<IndexKey>, Bound<IndexKey>) {
    let (lo, hi) = match &key {
        IndexKey::Bool(_) => {
            (Bound::Included(IndexKey::Bool(false)), Bound::Included(IndexKey::Bool(true)))
        }
        IndexKey::Num(_) => (
            Bound::Included(IndexKey::Num(OrderedFloat(f64::NEG_INFINITY))),
            Bound::Included(IndexKey::Num(OrderedFloat(f64::INFINITY))),
        ),
        IndexKey::Str(_) => (Bound::Included(IndexKey::Str(String::new())), Bound::Unbounded),
    };
    match op {
        CmpOp::Eq => (Bound::Included(key.clone()), Bound::Included(key)),
        CmpOp::Gt => (Bound::Excluded(key), hi),
        CmpOp::Gte => (Bound::Included(key), hi),
        CmpOp::Lt => (lo, Bound::Excluded(key)),
        CmpOp::Lte => (lo, Bound::Included(key)),
    }
}

fn bounds_are_ordered(lo: &Bound<IndexKey>, hi: &Bound<IndexKey>) -> bool {
    match (lo, hi) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
        (Bound::Excluded(a), Bound::Excluded(b)) => a < b,
        (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => a <= b,
    }
}

/// Candidates produced by one index probe.
#[derive(Debug, Clone, Default)]
pub struct IndexLookup {
    pub ids: Vec<DocumentId>,
    pub keys_examined: u64,
}

/// Ordered secondary index over the leading field of its spec.
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    pub name: String,
    pub spec: IndexSpec,
    pub map: BTreeMap<IndexKey, BTreeSet<DocumentId>>,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(name: String, spec: IndexSpec) -> Self {
        Self { name, spec, map: BTreeMap::new(), stats: IndexStats::default() }
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: &DocumentId) {
        if let Some(k) = get_path(doc, self.spec.leading_field()).and_then(key_from_bson) {
            if self.map.entry(k).or_default().insert(id.clone()) {
                self.stats.entries += 1;
            }
            self.stats.keys = self.map.len();
        }
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: &DocumentId) {
        let Some(k) = get_path(doc, self.spec.leading_field()).and_then(key_from_bson) else {
            return;
        };
        if let Some(set) = self.map.get_mut(&k) {
            if set.remove(id) {
                self.stats.entries = self.stats.entries.saturating_sub(1);
            }
            if set.is_empty() {
                self.map.remove(&k);
            }
        }
        self.stats.keys = self.map.len();
    }

    pub fn lookup(&mut self, op: CmpOp, value: &Bson) -> IndexLookup {
        let Some(key) = key_from_bson(value) else {
            self.stats.misses += 1;
            return IndexLookup::default();
        };
        let (lo, hi) = bounds_for(op, key);
        let mut out = IndexLookup::default();
        if bounds_are_ordered(&lo, &hi) {
            for (_k, set) in self.map.range((lo, hi)) {
                out.keys_examined += 1;
                out.ids.extend(set.iter().cloned());
            }
        }
        if out.ids.is_empty() {
            self.stats.misses += 1;
        } else {
            self.stats.hits += 1;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub key: Vec<IndexKeyField>,
    pub entries: usize,
    pub distinct_keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub build_time_ms: u64,
}

/// Acknowledgement for one `create_index` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexAck {
    pub name: String,
    pub created: bool,
}

/// The predicate an index will answer, chosen by `IndexManager::plan`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPlan {
    pub index_name: String,
    pub op: CmpOp,
    pub value: Bson,
}

#[derive(Debug, Default)]
pub struct IndexManager {
    // creation order is the listing order
    pub indexes: Vec<BTreeIndex>,
}

impl IndexManager {
    #[must_use]
    pub const fn new() -> Self {
        Self { indexes: Vec::new() }
    }

    /// Register an index. Returns the index name and whether it was newly created; the caller
    /// populates a new index from existing documents.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a malformed spec and `IndexConflict` when the name is
    /// taken by an index over different keys.
    pub fn create_index(&mut self, spec: &IndexSpec) -> Result<IndexAck, DbError> {
        spec.validate()?;
        let name = spec.resolved_name();
        if spec.is_id_index() {
            return Ok(IndexAck { name: ID_INDEX_NAME.to_string(), created: false });
        }
        if let Some(existing) = self.get(&name) {
            if existing.spec.same_keys(spec) {
                return Ok(IndexAck { name, created: false });
            }
            return Err(DbError::IndexConflict(format!(
                "an index named '{name}' already exists with key {}",
                existing.spec.default_name()
            )));
        }
        if let Some(existing) = self.indexes.iter().find(|i| i.spec.same_keys(spec)) {
            return Err(DbError::IndexConflict(format!(
                "index with key {} already exists as '{}'",
                spec.default_name(),
                existing.name
            )));
        }
        let mut normalized = spec.clone();
        normalized.name = Some(name.clone());
        self.indexes.push(BTreeIndex::new(name.clone(), normalized));
        Ok(IndexAck { name, created: true })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BTreeIndex> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BTreeIndex> {
        self.indexes.iter_mut().find(|i| i.name == name)
    }

    #[must_use]
    pub fn specs(&self) -> Vec<IndexSpec> {
        self.indexes.iter().map(|i| i.spec.clone()).collect()
    }

    #[must_use]
    pub fn descriptors(&self, document_count: usize) -> Vec<IndexDescriptor> {
        let primary = IndexDescriptor {
            name: ID_INDEX_NAME.to_string(),
            key: vec![IndexKeyField { field: "_id".into(), order: Order::Asc }],
            entries: document_count,
            distinct_keys: document_count,
            hits: 0,
            misses: 0,
            build_time_ms: 0,
        };
        std::iter::once(primary)
            .chain(self.indexes.iter().map(|i| IndexDescriptor {
                name: i.name.clone(),
                key: i.spec.keys.clone(),
                entries: i.stats.entries,
                distinct_keys: i.stats.keys,
                hits: i.stats.hits,
                misses: i.stats.misses,
                build_time_ms: i.stats.build_time_ms,
            }))
            .collect()
    }

    /// Pick the index that best answers `filter`: equality beats range, then the index whose
    /// keys cover more of the filtered fields, then creation order.
    #[must_use]
    pub fn plan(&self, filter: &Filter) -> Option<IndexPlan> {
        let mut preds = Vec::new();
        collect_predicates(filter, &mut preds);
        let paths: BTreeSet<&str> = preds.iter().map(|(p, _, _)| *p).collect();
        let mut best: Option<((u8, usize), IndexPlan)> = None;
        for idx in &self.indexes {
            for (path, op, value) in &preds {
                if *path != idx.spec.leading_field() || key_from_bson(value).is_none() {
                    continue;
                }
                let covered =
                    idx.spec.keys.iter().filter(|k| paths.contains(k.field.as_str())).count();
                let score = (u8::from(*op == CmpOp::Eq), covered);
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = Some((
                        score,
                        IndexPlan { index_name: idx.name.clone(), op: *op, value: (*value).clone() },
                    ));
                }
            }
        }
        best.map(|(_, plan)| plan)
    }

    pub fn lookup(&mut self, plan: &IndexPlan) -> Option<IndexLookup> {
        self.get_mut(&plan.index_name).map(|idx| idx.lookup(plan.op, &plan.value))
    }
}

// Only conjunctive comparisons are index-answerable.
fn collect_predicates<'a>(filter: &'a Filter, out: &mut Vec<(&'a str, CmpOp, &'a Bson)>) {
    match filter {
        Filter::Cmp { path, op, value } => out.push((path.as_str(), *op, value)),
        Filter::And(fs) => fs.iter().for_each(|f| collect_predicates(f, out)),
        _ => {}
    }
}

pub fn index_insert_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in &mut mgr.indexes {
        idx.insert(doc, id);
    }
}

pub fn index_remove_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in &mut mgr.indexes {
        idx.remove(doc, id);
    }
}
