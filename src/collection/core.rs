use crate::document::Document;
use crate::index::IndexManager;
use crate::types::DocumentId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Documents keyed by insertion sequence so scans follow natural order.
#[derive(Debug, Default)]
pub(crate) struct DocStore {
    pub(crate) next_seq: u64,
    pub(crate) by_seq: BTreeMap<u64, Document>,
    pub(crate) seq_of: HashMap<DocumentId, u64>,
}

#[derive(Debug)]
pub struct Collection {
    pub(crate) name: String,
    pub(crate) docs: RwLock<DocStore>,
    pub indexes: RwLock<IndexManager>,
    pub(crate) build_lock: RwLock<()>,
}

impl Collection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            docs: RwLock::new(DocStore::default()),
            indexes: RwLock::new(IndexManager::new()),
            build_lock: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn name_str(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().by_seq.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
