use crate::access::value::{TupleDesc, Value};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use std::sync::Arc;

/// Logical address of a stored tuple: the page it lives on plus its slot
/// within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

/// A schema-conformant record.
///
/// The record id is absent until the tuple is stored: insert sets it, and
/// a tuple materialized from a page carries the location it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Builds a tuple, validating the values against the schema.
    pub fn new(desc: Arc<TupleDesc>, values: Vec<Value>) -> StorageResult<Self> {
        if values.len() != desc.field_count() {
            return Err(StorageError::SchemaMismatch);
        }
        for (i, value) in values.iter().enumerate() {
            if !value.is_compatible_with(desc.field_type(i)) {
                return Err(StorageError::SchemaMismatch);
            }
        }
        Ok(Self {
            desc,
            values,
            record_id: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, i: usize) -> &Value {
        &self.values[i]
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub(crate) fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}
