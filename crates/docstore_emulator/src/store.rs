//! Versioned document storage.

use crate::error::{EmulatorError, EmulatorResult};
use docstore_protocol::{
    field_value, remove_field_value, set_field_value, Document, DocumentData, Precondition,
    ResourcePath, Timestamp, Write, WriteKind, WriteResult,
};
use std::collections::BTreeMap;

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Field data.
    pub fields: DocumentData,
    /// Time the document was created.
    pub create_time: Timestamp,
    /// Time of the last write.
    pub update_time: Timestamp,
    /// Bumped on every write; compared against transaction read sets.
    pub version: u64,
}

impl StoredDocument {
    /// Converts to the wire form.
    pub fn to_document(&self, path: &ResourcePath) -> Document {
        Document {
            path: path.clone(),
            fields: self.fields.clone(),
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

/// Documents keyed by path, with a logical clock.
///
/// The clock advances by one per applied commit; every write of a commit
/// shares that commit's timestamp.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: BTreeMap<ResourcePath, StoredDocument>,
    clock: i64,
    next_version: u64,
}

impl DocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current logical time.
    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.clock, 0)
    }

    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the store holds no document.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns a document.
    pub fn get(&self, path: &ResourcePath) -> Option<&StoredDocument> {
        self.documents.get(path)
    }

    /// Returns the version of a document, `None` if it does not exist.
    pub fn version(&self, path: &ResourcePath) -> Option<u64> {
        self.documents.get(path).map(|doc| doc.version)
    }

    /// Returns the documents directly inside `collection`.
    pub fn children<'a>(
        &'a self,
        collection: &ResourcePath,
    ) -> impl Iterator<Item = (&'a ResourcePath, &'a StoredDocument)> + 'a {
        let collection = collection.clone();
        self.documents
            .iter()
            .filter(move |(path, _)| collection.is_parent_of(path))
    }

    /// Writes a document outside any transaction, replacing it.
    pub fn put(&mut self, path: ResourcePath, fields: DocumentData) -> Timestamp {
        let writes = [Write {
            document: path,
            kind: WriteKind::Update(fields),
            update_mask: None,
            precondition: None,
        }];
        // Without preconditions nothing can fail
        match self.apply(&writes) {
            Ok((_, commit_time)) => commit_time,
            Err(_) => self.now(),
        }
    }

    /// Applies writes atomically: either all preconditions hold and every
    /// write lands at one commit time, or nothing changes.
    pub fn apply(&mut self, writes: &[Write]) -> EmulatorResult<(Vec<WriteResult>, Timestamp)> {
        let commit_time = Timestamp::new(self.clock + 1, 0);
        let mut staged: BTreeMap<ResourcePath, Option<StoredDocument>> = BTreeMap::new();
        let mut results = Vec::with_capacity(writes.len());
        let mut version = self.next_version;

        for write in writes {
            let current = match staged.get(&write.document) {
                Some(staged) => staged.clone(),
                None => self.documents.get(&write.document).cloned(),
            };
            check_precondition(&write.document, current.as_ref(), write.precondition)?;

            let next = match &write.kind {
                WriteKind::Delete => None,
                WriteKind::Update(data) => {
                    let fields = match &write.update_mask {
                        None => data.clone(),
                        Some(mask) => {
                            let mut fields = current
                                .as_ref()
                                .map(|doc| doc.fields.clone())
                                .unwrap_or_default();
                            for path in &mask.field_paths {
                                match field_value(data, path) {
                                    Some(value) => set_field_value(&mut fields, path, value.clone()),
                                    None => {
                                        remove_field_value(&mut fields, path);
                                    }
                                }
                            }
                            fields
                        }
                    };
                    version += 1;
                    Some(StoredDocument {
                        fields,
                        create_time: current.map_or(commit_time, |doc| doc.create_time),
                        update_time: commit_time,
                        version,
                    })
                }
            };

            results.push(WriteResult {
                update_time: next.as_ref().map(|_| commit_time),
            });
            staged.insert(write.document.clone(), next);
        }

        self.clock += 1;
        self.next_version = version;
        for (path, doc) in staged {
            match doc {
                Some(doc) => {
                    self.documents.insert(path, doc);
                }
                None => {
                    self.documents.remove(&path);
                }
            }
        }
        Ok((results, commit_time))
    }
}

fn check_precondition(
    path: &ResourcePath,
    current: Option<&StoredDocument>,
    precondition: Option<Precondition>,
) -> EmulatorResult<()> {
    match (precondition, current) {
        (None, _) => Ok(()),
        (Some(Precondition::Exists(true)), None) => Err(EmulatorError::NotFound(path.clone())),
        (Some(Precondition::Exists(false)), Some(_)) => {
            Err(EmulatorError::AlreadyExists(path.clone()))
        }
        (Some(Precondition::Exists(_)), _) => Ok(()),
        (Some(Precondition::UpdateTime(expected)), Some(doc)) if doc.update_time == expected => {
            Ok(())
        }
        (Some(Precondition::UpdateTime(_)), _) => {
            Err(EmulatorError::PreconditionFailed(path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_protocol::{DocumentMask, FieldPath};
    use serde_json::json;

    fn path(p: &str) -> ResourcePath {
        ResourcePath::parse_document(p).unwrap()
    }

    fn data(value: serde_json::Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    fn update(p: &str, value: serde_json::Value) -> Write {
        Write {
            document: path(p),
            kind: WriteKind::Update(data(value)),
            update_mask: None,
            precondition: None,
        }
    }

    #[test]
    fn put_bumps_version_and_clock() {
        let mut store = DocumentStore::new();
        let t1 = store.put(path("users/a"), data(json!({"n": 1})));
        let v1 = store.version(&path("users/a")).unwrap();
        let t2 = store.put(path("users/a"), data(json!({"n": 2})));

        assert!(t2 > t1);
        assert!(store.version(&path("users/a")).unwrap() > v1);
        let doc = store.get(&path("users/a")).unwrap();
        assert_eq!(doc.create_time, t1);
        assert_eq!(doc.update_time, t2);
    }

    #[test]
    fn masked_update_merges_fields() {
        let mut store = DocumentStore::new();
        store.put(path("users/a"), data(json!({"name": "a", "address": {"city": "X", "zip": 1}})));

        let mut write = update("users/a", json!({"address": {"city": "Y"}}));
        write.update_mask = Some(DocumentMask::new(vec![
            FieldPath::parse("address.city").unwrap(),
            FieldPath::parse("name").unwrap(),
        ]));
        store.apply(&[write]).unwrap();

        // Masked fields absent from the data are removed
        assert_eq!(
            store.get(&path("users/a")).unwrap().fields,
            data(json!({"address": {"city": "Y", "zip": 1}}))
        );
    }

    #[test]
    fn failed_precondition_changes_nothing() {
        let mut store = DocumentStore::new();
        store.put(path("users/a"), data(json!({"n": 1})));
        let before = store.now();

        let mut create = update("users/a", json!({"n": 2}));
        create.precondition = Some(Precondition::Exists(false));
        let writes = [update("users/b", json!({"n": 1})), create];

        let err = store.apply(&writes).unwrap_err();
        assert!(matches!(err, EmulatorError::AlreadyExists(_)));
        assert!(store.get(&path("users/b")).is_none());
        assert_eq!(store.now(), before);
    }

    #[test]
    fn preconditions_see_earlier_writes_in_the_batch() {
        let mut store = DocumentStore::new();
        let mut must_exist = update("users/a", json!({"n": 2}));
        must_exist.precondition = Some(Precondition::Exists(true));

        let (results, commit_time) = store
            .apply(&[update("users/a", json!({"n": 1})), must_exist])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].update_time, Some(commit_time));
    }

    #[test]
    fn update_time_precondition() {
        let mut store = DocumentStore::new();
        let t = store.put(path("users/a"), data(json!({})));

        let mut stale = update("users/a", json!({"n": 1}));
        stale.precondition = Some(Precondition::UpdateTime(Timestamp::new(t.seconds - 1, 0)));
        assert!(matches!(
            store.apply(&[stale]),
            Err(EmulatorError::PreconditionFailed(_))
        ));

        let mut fresh = update("users/a", json!({"n": 1}));
        fresh.precondition = Some(Precondition::UpdateTime(t));
        assert!(store.apply(&[fresh]).is_ok());
    }

    #[test]
    fn delete_removes_and_reports_no_update_time() {
        let mut store = DocumentStore::new();
        store.put(path("users/a"), data(json!({})));
        let delete = Write {
            document: path("users/a"),
            kind: WriteKind::Delete,
            update_mask: None,
            precondition: Some(Precondition::Exists(true)),
        };
        let (results, _) = store.apply(&[delete]).unwrap();
        assert_eq!(results[0].update_time, None);
        assert!(store.is_empty());
    }

    #[test]
    fn children_are_direct_only() {
        let mut store = DocumentStore::new();
        store.put(path("users/a"), data(json!({})));
        store.put(path("users/a/posts/p"), data(json!({})));
        store.put(path("teams/t"), data(json!({})));

        let users = ResourcePath::parse_collection("users").unwrap();
        let ids: Vec<_> = store
            .children(&users)
            .map(|(p, _)| p.to_string())
            .collect();
        assert_eq!(ids, vec!["users/a"]);
    }
}
