//! Buffered writes.

use crate::error::{TransactionError, TxnResult};
use crate::reference::DocumentReference;
use crate::transport::{CallContext, Transport};
use docstore_protocol::{
    field_value, leaf_field_paths, set_field_value, CommitRequest, CommitResponse, DocumentData,
    DocumentMask, FieldPath, Precondition, RpcResult, TransactionId, Value, Write, WriteKind,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Merge {
    All,
    Fields(Vec<FieldPath>),
}

/// How `set` combines new data with an existing document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    merge: Option<Merge>,
}

impl SetOptions {
    /// Replace the whole document (the default).
    pub fn overwrite() -> Self {
        Self::default()
    }

    /// Merge every field present in the data into the existing document.
    pub fn merge() -> Self {
        Self {
            merge: Some(Merge::All),
        }
    }

    /// Merge only the named fields; each must be present in the data.
    pub fn merge_fields<I, S>(fields: I) -> TxnResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = fields
            .into_iter()
            .map(|f| FieldPath::parse(f.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            merge: Some(Merge::Fields(fields)),
        })
    }
}

/// An ordered list of pending writes for one database.
///
/// Writes are only validated and buffered here; nothing is sent until
/// [`commit`](WriteBatch::commit), which consumes the batch.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    database: Arc<str>,
    writes: Vec<Write>,
}

impl WriteBatch {
    pub(crate) fn new(database: Arc<str>) -> Self {
        Self {
            database,
            writes: Vec::new(),
        }
    }

    /// Returns true if no write is buffered.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Returns the number of buffered writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns the buffered writes in issue order.
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Creates a document; fails at commit if it already exists.
    pub fn create(&mut self, doc: &DocumentReference, data: DocumentData) -> TxnResult<&mut Self> {
        self.check_database(doc)?;
        self.writes.push(Write {
            document: doc.path().clone(),
            kind: WriteKind::Update(data),
            update_mask: None,
            precondition: Some(Precondition::Exists(false)),
        });
        Ok(self)
    }

    /// Writes a document, creating it if needed.
    pub fn set(
        &mut self,
        doc: &DocumentReference,
        data: DocumentData,
        options: SetOptions,
    ) -> TxnResult<&mut Self> {
        self.check_database(doc)?;
        let update_mask = match options.merge {
            None => None,
            Some(Merge::All) => Some(DocumentMask::new(leaf_field_paths(&data)?)),
            Some(Merge::Fields(fields)) => {
                if let Some(missing) = fields.iter().find(|f| field_value(&data, f).is_none()) {
                    return Err(TransactionError::invalid_argument(format!(
                        "input data is missing for merge field {missing}"
                    )));
                }
                Some(DocumentMask::new(fields))
            }
        };
        self.writes.push(Write {
            document: doc.path().clone(),
            kind: WriteKind::Update(data),
            update_mask,
            precondition: None,
        });
        Ok(self)
    }

    /// Updates fields of an existing document.
    ///
    /// Keys are dotted field paths. At least one field is required, and no
    /// field may be an ancestor of another. Without an explicit precondition
    /// the document must exist.
    pub fn update<I, K, V>(
        &mut self,
        doc: &DocumentReference,
        fields: I,
        precondition: Option<Precondition>,
    ) -> TxnResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.check_database(doc)?;

        let mut pairs: Vec<(FieldPath, Value)> = Vec::new();
        for (key, value) in fields {
            pairs.push((FieldPath::parse(key.as_ref())?, value.into()));
        }
        if pairs.is_empty() {
            return Err(TransactionError::invalid_argument(
                "update requires a document and at least one field/value pair",
            ));
        }
        for (i, (a, _)) in pairs.iter().enumerate() {
            for (b, _) in &pairs[i + 1..] {
                if a.is_prefix_of(b) || b.is_prefix_of(a) {
                    return Err(TransactionError::invalid_argument(format!(
                        "field {a} conflicts with field {b}"
                    )));
                }
            }
        }

        let mut data = DocumentData::new();
        let mut mask = Vec::with_capacity(pairs.len());
        for (path, value) in pairs {
            set_field_value(&mut data, &path, value);
            mask.push(path);
        }

        self.writes.push(Write {
            document: doc.path().clone(),
            kind: WriteKind::Update(data),
            update_mask: Some(DocumentMask::new(mask)),
            precondition: Some(precondition.unwrap_or(Precondition::Exists(true))),
        });
        Ok(self)
    }

    /// Deletes a document.
    pub fn delete(
        &mut self,
        doc: &DocumentReference,
        precondition: Option<Precondition>,
    ) -> TxnResult<&mut Self> {
        self.check_database(doc)?;
        self.writes.push(Write {
            document: doc.path().clone(),
            kind: WriteKind::Delete,
            update_mask: None,
            precondition,
        });
        Ok(self)
    }

    /// Sends every buffered write in one atomic commit.
    pub fn commit<T: Transport + ?Sized>(
        self,
        transport: &T,
        transaction: Option<TransactionId>,
        context: &CallContext,
    ) -> RpcResult<CommitResponse> {
        let request = CommitRequest {
            database: self.database.to_string(),
            writes: self.writes,
            transaction,
        };
        transport.commit(&request, context)
    }

    fn check_database(&self, doc: &DocumentReference) -> TxnResult<()> {
        if doc.database() != &*self.database {
            return Err(TransactionError::invalid_argument(format!(
                "document {} belongs to {}, not {}",
                doc.path(),
                doc.database(),
                self.database
            )));
        }
        Ok(())
    }
}
