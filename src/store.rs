//! The seam between the query runner and a document store.

use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::index::{IndexAck, IndexDescriptor, IndexSpec};
use crate::query::{
    self, DeleteReport, ExplainReport, Filter, FindOptions, Pipeline, UpdateDoc, UpdateReport,
};
use bson::Document as BsonDocument;
use std::sync::Arc;

/// Operations the runner needs from one collection. Calls are synchronous and never retried.
pub trait DocumentStore {
    fn name(&self) -> &str;

    /// # Errors
    /// Store-specific; the embedded store never fails a find.
    fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>, DbError>;

    /// # Errors
    /// Store-specific.
    fn count(&self, filter: &Filter) -> Result<u64, DbError>;

    /// # Errors
    /// Store-specific. A filter with no match is not an error.
    fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError>;

    /// # Errors
    /// Store-specific. A filter with no match is not an error.
    fn delete_one(&self, filter: &Filter) -> Result<DeleteReport, DbError>;

    /// # Errors
    /// `Query` when a pipeline expression cannot be evaluated.
    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError>;

    /// # Errors
    /// `InvalidArgument` for a malformed spec, `IndexConflict` for a clashing one.
    fn create_index(&self, spec: &IndexSpec) -> Result<IndexAck, DbError>;

    /// # Errors
    /// Store-specific.
    fn list_indexes(&self) -> Result<Vec<IndexDescriptor>, DbError>;

    /// # Errors
    /// Store-specific.
    fn explain_find(&self, filter: &Filter) -> Result<ExplainReport, DbError>;
}

impl DocumentStore for Collection {
    fn name(&self) -> &str {
        self.name_str()
    }

    fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>, DbError> {
        Ok(query::find_docs(self, filter, opts))
    }

    fn count(&self, filter: &Filter) -> Result<u64, DbError> {
        Ok(query::count_docs(self, filter) as u64)
    }

    fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        Ok(query::update_one(self, filter, update))
    }

    fn delete_one(&self, filter: &Filter) -> Result<DeleteReport, DbError> {
        Ok(query::delete_one(self, filter))
    }

    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError> {
        query::aggregate(self, pipeline)
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<IndexAck, DbError> {
        Self::create_index(self, spec)
    }

    fn list_indexes(&self) -> Result<Vec<IndexDescriptor>, DbError> {
        Ok(Self::list_indexes(self))
    }

    fn explain_find(&self, filter: &Filter) -> Result<ExplainReport, DbError> {
        Ok(query::explain_find(self, filter))
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>, DbError> {
        (**self).find(filter, opts)
    }

    fn count(&self, filter: &Filter) -> Result<u64, DbError> {
        (**self).count(filter)
    }

    fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        (**self).update_one(filter, update)
    }

    fn delete_one(&self, filter: &Filter) -> Result<DeleteReport, DbError> {
        (**self).delete_one(filter)
    }

    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError> {
        (**self).aggregate(pipeline)
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<IndexAck, DbError> {
        (**self).create_index(spec)
    }

    fn list_indexes(&self) -> Result<Vec<IndexDescriptor>, DbError> {
        (**self).list_indexes()
    }

    fn explain_find(&self, filter: &Filter) -> Result<ExplainReport, DbError> {
        (**self).explain_find(filter)
    }
}
