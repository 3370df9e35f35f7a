//! Typed access to the records of one registered model.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::model::codec;
use crate::model::error::{ModelError, ModelResult};
use crate::model::schema::ModelSchema;
use crate::storage::{normalize, split_path, BlobId, CommitId, GitSignature, RecordKey, StorageError, TreeId};
use crate::workspace::{LockGuard, Workspace, WorkspaceError};

/// A value stored as a record of some model.
pub trait Record: Serialize + DeserializeOwned {
    /// The record's id. Used as a directory name, so it must be a valid
    /// [`RecordKey`].
    fn key(&self) -> String;
}

/// Handle returned by [`Workspace::register_model`].
///
/// Holds no workspace state; every operation takes the workspace it works
/// on.
pub struct ModelHandle<T> {
    schema: Arc<ModelSchema>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for ModelHandle<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ModelHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle").field("schema", &self.schema).finish()
    }
}

impl<T: Record> ModelHandle<T> {
    pub(crate) fn new(schema: Arc<ModelSchema>) -> Self {
        Self {
            schema,
            _record: PhantomData,
        }
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    fn key(id: &str) -> ModelResult<RecordKey> {
        Ok(RecordKey::new(id)?)
    }

    fn does_not_exist(&self, id: &str, revision: Option<&str>) -> ModelError {
        ModelError::DoesNotExist {
            model: self.schema.name().to_string(),
            id: id.to_string(),
            revision: revision.map(str::to_string),
        }
    }

    /// Load record `id` from the workspace index.
    pub fn get(&self, ws: &Workspace, id: &str) -> ModelResult<T> {
        self.load(ws, ws.index(), id, None)
    }

    /// Load record `id` as of `treeish` (a branch, commit or tree id).
    pub fn get_at(&self, ws: &Workspace, id: &str, treeish: &str) -> ModelResult<T> {
        let tree = ws.resolve_tree(treeish)?;
        self.load(ws, tree, id, Some(treeish))
    }

    fn load(&self, ws: &Workspace, tree: TreeId, id: &str, revision: Option<&str>) -> ModelResult<T> {
        let key = Self::key(id)?;
        let path = self.schema.data_path(key.as_str());
        match ws.read_at(tree, &path)? {
            Some(data) => codec::decode(self.schema.name(), &data),
            None => Err(self.does_not_exist(id, revision)),
        }
    }

    /// Whether record `id` exists in the workspace index.
    pub fn exists(&self, ws: &Workspace, id: &str) -> ModelResult<bool> {
        let key = Self::key(id)?;
        Ok(ws.entry(&self.schema.data_path(key.as_str()))?.is_some())
    }

    /// Store a new record, failing if one with the same id exists.
    pub fn create(&self, ws: &mut Workspace, record: &T) -> ModelResult<BlobId> {
        let key = Self::key(&record.key())?;
        if self.exists(ws, key.as_str())? {
            return Err(ModelError::Integrity {
                model: self.schema.name().to_string(),
                id: key.into_string(),
            });
        }
        self.write(ws, &key, record)
    }

    /// Store a record, replacing any existing one with the same id.
    pub fn save(&self, ws: &mut Workspace, record: &T) -> ModelResult<BlobId> {
        let key = Self::key(&record.key())?;
        self.write(ws, &key, record)
    }

    /// Save a record and commit it on its own.
    ///
    /// Refused when the workspace already has pending changes, so that
    /// unrelated work is never swept into this commit.
    pub fn save_and_commit(
        &self,
        ws: &mut Workspace,
        record: &T,
        message: &str,
        author: Option<GitSignature>,
        committer: Option<GitSignature>,
    ) -> ModelResult<(BlobId, Option<CommitId>)> {
        if ws.has_changes()? {
            return Err(WorkspaceError::pending("save-commit").into());
        }
        let blob = self.save(ws, record)?;
        let commit = ws.commit(message, author, committer)?;
        Ok((blob, commit))
    }

    fn write(&self, ws: &mut Workspace, key: &RecordKey, record: &T) -> ModelResult<BlobId> {
        let data = codec::encode(self.schema.name(), record)?;
        let path = self.schema.data_path(key.as_str());
        let blob = ws.add_blob(&path, data)?;
        debug!(model = %self.schema.name(), id = %key, blob = %blob, "saved record");
        Ok(blob)
    }

    /// Every record of this model in the workspace index, in stored order.
    pub fn all(&self, ws: &Workspace) -> ModelResult<Vec<T>> {
        let pattern = self.schema.data_path("*");
        ws.glob(&pattern)?
            .iter()
            .map(|path| {
                let data = ws
                    .read(path)?
                    .ok_or_else(|| StorageError::PathNotFound(path.clone()))?;
                codec::decode(self.schema.name(), &data)
            })
            .collect()
    }

    /// Remove record `id` together with its directory.
    pub fn delete(&self, ws: &mut Workspace, id: &str) -> ModelResult<()> {
        let key = Self::key(id)?;
        let path = self.schema.data_path(key.as_str());
        if ws.entry(&path)?.is_none() {
            return Err(self.does_not_exist(id, None));
        }

        let path = normalize(&path);
        let (dir, _) = split_path(path);
        ws.remove(if dir.is_empty() { path } else { dir })?;

        debug!(model = %self.schema.name(), id = %key, "deleted record");
        Ok(())
    }

    /// Acquire the lock for record `id` (lock id `<model>/<id>`).
    pub fn lock(&self, ws: &Workspace, id: &str) -> ModelResult<LockGuard> {
        let key = Self::key(id)?;
        Ok(ws.lock(&self.schema.lock_id(key.as_str()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceConfig;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        slug: String,
        first_name: String,
        last_name: String,
        email: Option<String>,
    }

    impl Person {
        fn new(slug: &str, first_name: &str, last_name: &str) -> Self {
            Self {
                slug: slug.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: None,
            }
        }
    }

    impl Record for Person {
        fn key(&self) -> String {
            self.slug.clone()
        }
    }

    fn setup() -> (TempDir, Workspace, ModelHandle<Person>) {
        let dir = TempDir::new().unwrap();
        let mut ws = Workspace::open_with_config(WorkspaceConfig::new(dir.path()).create_if_missing(true)).unwrap();
        let people = ws.register_model::<Person>(ModelSchema::new("Person"));
        (dir, ws, people)
    }

    #[test]
    fn test_save_and_get() {
        let (_dir, mut ws, people) = setup();
        let john = Person::new("john-doe", "John", "Doe");

        people.save(&mut ws, &john).unwrap();
        assert_eq!(people.get(&ws, "john-doe").unwrap(), john);

        let raw = ws.read("person/john-doe/data.json").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["model"], "Person");
        assert_eq!(value["fields"]["first_name"], "John");
    }

    #[test]
    fn test_get_missing() {
        let (_dir, ws, people) = setup();
        let err = people.get(&ws, "nobody").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Person with id nobody does not exist");
    }

    #[test]
    fn test_create_integrity() {
        let (_dir, mut ws, people) = setup();
        let john = Person::new("john-doe", "John", "Doe");

        people.create(&mut ws, &john).unwrap();
        let err = people.create(&mut ws, &john).unwrap_err();
        assert!(matches!(err, ModelError::Integrity { ref id, .. } if id == "john-doe"));

        // plain save overwrites
        let mut renamed = john.clone();
        renamed.first_name = "Johnny".to_string();
        people.save(&mut ws, &renamed).unwrap();
        assert_eq!(people.get(&ws, "john-doe").unwrap().first_name, "Johnny");
    }

    #[test]
    fn test_save_and_commit() {
        let (_dir, mut ws, people) = setup();
        let john = Person::new("john-doe", "John", "Doe");

        let (_, commit) = people
            .save_and_commit(&mut ws, &john, "add john", None, None)
            .unwrap();
        assert!(commit.is_some());
        assert!(!ws.has_changes().unwrap());

        // unrelated pending work blocks the next save-commit
        ws.add_blob("notes.txt", "unrelated").unwrap();
        let jane = Person::new("jane-doe", "Jane", "Doe");
        let err = people
            .save_and_commit(&mut ws, &jane, "add jane", None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::Workspace(WorkspaceError::PendingChanges { .. })
        ));
        assert!(!people.exists(&ws, "jane-doe").unwrap());
    }

    #[test]
    fn test_get_at_revision() {
        let (_dir, mut ws, people) = setup();
        let mut john = Person::new("john-doe", "John", "Doe");

        let (_, first) = people.save_and_commit(&mut ws, &john, "v1", None, None).unwrap();
        john.email = Some("john@example.com".to_string());
        people.save_and_commit(&mut ws, &john, "v2", None, None).unwrap();

        let first = first.unwrap().to_string();
        let old = people.get_at(&ws, "john-doe", &first).unwrap();
        assert_eq!(old.email, None);
        assert_eq!(
            people.get(&ws, "john-doe").unwrap().email.as_deref(),
            Some("john@example.com")
        );

        people.delete(&mut ws, "john-doe").unwrap();
        ws.commit("remove john", None, None).unwrap();
        let err = people.get_at(&ws, "john-doe", "refs/heads/master").unwrap_err();
        assert!(matches!(err, ModelError::DoesNotExist { revision: Some(_), .. }));
    }

    #[test]
    fn test_all() {
        let (_dir, mut ws, people) = setup();
        for (slug, first) in [("c", "Carol"), ("a", "Alice"), ("b", "Bob")] {
            people.save(&mut ws, &Person::new(slug, first, "Example")).unwrap();
        }
        ws.add_blob("person/stray.txt", "not a record").unwrap();

        let names: Vec<_> = people
            .all(&ws)
            .unwrap()
            .into_iter()
            .map(|p| p.first_name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_delete() {
        let (_dir, mut ws, people) = setup();
        people.save(&mut ws, &Person::new("john-doe", "John", "Doe")).unwrap();
        people.save(&mut ws, &Person::new("jane-doe", "Jane", "Doe")).unwrap();

        people.delete(&mut ws, "john-doe").unwrap();
        assert!(ws.entry("person/john-doe").unwrap().is_none());
        assert!(people.exists(&ws, "jane-doe").unwrap());

        let err = people.delete(&mut ws, "john-doe").unwrap_err();
        assert!(matches!(err, ModelError::DoesNotExist { .. }));
    }

    #[test]
    fn test_lock() {
        let (_dir, ws, people) = setup();
        {
            let guard = people.lock(&ws, "john-doe").unwrap();
            assert_eq!(guard.id(), "person/john-doe");
            assert!(ws.locked("person/john-doe").unwrap());
        }
        assert!(!ws.locked("person/john-doe").unwrap());
    }

    #[test]
    fn test_invalid_key() {
        let (_dir, mut ws, people) = setup();
        let err = people
            .save(&mut ws, &Person::new("../escape", "Bad", "Key"))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidKey(_)));
    }

    #[test]
    fn test_register_twice_keeps_first_schema() {
        let (_dir, mut ws, _) = setup();
        let again = ws.register_model::<Person>(ModelSchema::new("Person").with_data_filename("other.json"));
        assert_eq!(again.schema().data_filename(), "data.json");
        assert!(ws.model("Person").is_some());
        assert!(ws.model("Post").is_none());
    }

    #[test]
    fn test_custom_path_and_model_mismatch() {
        let (_dir, mut ws, people) = setup();
        people.save(&mut ws, &Person::new("john-doe", "John", "Doe")).unwrap();

        // a second model reading the same files
        let aliases = ws.register_model::<Person>(
            ModelSchema::new("Alias").with_data_path(|_, id| format!("person/{}/data.json", id)),
        );
        let err = aliases.get(&ws, "john-doe").unwrap_err();
        assert!(matches!(err, ModelError::ModelMismatch { .. }));
    }
}
