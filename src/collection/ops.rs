use super::core::Collection;
use crate::document::Document;
use crate::index::{index_insert_all, index_remove_all};
use crate::types::DocumentId;

impl Collection {
    pub fn insert_document(&self, document: Document) -> DocumentId {
        let _guard = self.build_lock.read();
        let doc_id = document.id.clone();
        let mut docs = self.docs.write();
        let mut indexes = self.indexes.write();
        // same id inserted twice: the newer copy replaces the older one
        if let Some(old) = docs.seq_of.remove(&doc_id).and_then(|s| docs.by_seq.remove(&s)) {
            index_remove_all(&mut indexes, &old.data, &doc_id);
        }
        index_insert_all(&mut indexes, &document.data, &doc_id);
        let seq = docs.next_seq;
        docs.next_seq += 1;
        docs.seq_of.insert(doc_id.clone(), seq);
        docs.by_seq.insert(seq, document);
        log::trace!("insert collection={} id={doc_id}", self.name);
        doc_id
    }

    #[must_use]
    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        let docs = self.docs.read();
        docs.seq_of.get(id).and_then(|seq| docs.by_seq.get(seq)).cloned()
    }

    /// Replace the fields of an existing document, keeping its position in natural order.
    pub fn update_document(&self, id: &DocumentId, new_document: Document) -> bool {
        let _guard = self.build_lock.read();
        let mut docs = self.docs.write();
        let Some(seq) = docs.seq_of.get(id).copied() else {
            return false;
        };
        let Some(slot) = docs.by_seq.get_mut(&seq) else {
            return false;
        };
        let mut indexes = self.indexes.write();
        index_remove_all(&mut indexes, &slot.data, id);
        slot.update(new_document.data);
        index_insert_all(&mut indexes, &slot.data, id);
        log::trace!("update collection={} id={id}", self.name);
        true
    }

    pub fn delete_document(&self, id: &DocumentId) -> bool {
        let _guard = self.build_lock.read();
        let mut docs = self.docs.write();
        let Some(seq) = docs.seq_of.remove(id) else {
            return false;
        };
        if let Some(old) = docs.by_seq.remove(&seq) {
            index_remove_all(&mut self.indexes.write(), &old.data, id);
        }
        log::trace!("delete collection={} id={id}", self.name);
        true
    }

    /// All documents in natural (insertion) order.
    #[must_use]
    pub fn get_all_documents(&self) -> Vec<Document> {
        self.docs.read().by_seq.values().cloned().collect()
    }

    /// Put `ids` into natural order, dropping ids that no longer exist.
    #[must_use]
    pub fn in_natural_order(&self, ids: Vec<DocumentId>) -> Vec<Document> {
        let docs = self.docs.read();
        let mut seqs: Vec<u64> = ids.iter().filter_map(|id| docs.seq_of.get(id).copied()).collect();
        seqs.sort_unstable();
        seqs.dedup();
        seqs.into_iter().filter_map(|s| docs.by_seq.get(&s).cloned()).collect()
    }

    /// Remove every document, keeping the index definitions.
    pub fn clear(&self) {
        let _guard = self.build_lock.write();
        let mut docs = self.docs.write();
        let mut indexes = self.indexes.write();
        for (_, doc) in std::mem::take(&mut docs.by_seq) {
            index_remove_all(&mut indexes, &doc.data, &doc.id);
        }
        docs.seq_of.clear();
    }
}
