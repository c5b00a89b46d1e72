use crate::types::DocumentId;
use bson::Document as BsonDocument;

/// A stored document: the store-assigned id plus the user fields.
///
/// `_id` is kept out of `data` so projections never carry it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
}

impl Document {
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self { id: DocumentId::new(), data }
    }

    #[must_use]
    pub const fn with_id(id: DocumentId, data: BsonDocument) -> Self {
        Self { id, data }
    }

    pub fn update(&mut self, new_data: BsonDocument) {
        self.data = new_data;
    }
}
