//! Typed collections over the persisted store.
//!
//! Each entity lives as a JSON array under one store key. Records are
//! replaced by id on update and filtered out on delete.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CrmError, Result};
use crate::storage::Storage;

pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Store key holding the whole collection.
    const COLLECTION: &'static str;
    /// Singular name used in logs and errors.
    const ENTITY: &'static str;

    fn id(&self) -> &str;
}

pub struct Collection<T: Record> {
    storage: Storage,
    seed: fn() -> Vec<T>,
}

impl<T: Record> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            seed: self.seed,
        }
    }
}

impl<T: Record> Collection<T> {
    /// `seed` is what the collection holds (and persists) the first time it
    /// is read from an empty store.
    pub fn new(storage: Storage, seed: fn() -> Vec<T>) -> Self {
        Self { storage, seed }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn all(&self) -> Result<Vec<T>> {
        self.storage.read(T::COLLECTION, self.seed)
    }

    pub fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.all()?.into_iter().find(|r| r.id() == id))
    }

    pub fn insert(&self, record: T) -> Result<T> {
        let id = record.id().to_string();
        let inserted = self.storage.mutate(T::COLLECTION, self.seed, |items: &mut Vec<T>| {
            if items.iter().any(|r| r.id() == record.id()) {
                return Err(CrmError::Validation(format!(
                    "{} with id {} already exists",
                    T::ENTITY,
                    record.id()
                )));
            }
            items.push(record.clone());
            Ok(Some(record))
        })?;
        inserted.ok_or_else(|| CrmError::not_found(T::ENTITY, id))
    }

    /// Apply `f` to the record with `id`. `Ok(None)` when no such record
    /// exists; an error from `f` leaves the collection untouched.
    pub fn modify<F>(&self, id: &str, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        self.storage
            .mutate(T::COLLECTION, self.seed, |items: &mut Vec<T>| {
                match items.iter_mut().find(|r| r.id() == id) {
                    Some(record) => {
                        f(record)?;
                        Ok(Some(record.clone()))
                    }
                    None => Ok(None),
                }
            })
    }

    /// True when a record was removed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let removed = self
            .storage
            .mutate(T::COLLECTION, self.seed, |items: &mut Vec<T>| {
                let before = items.len();
                items.retain(|r| r.id() != id);
                Ok((items.len() < before).then_some(()))
            })?;
        Ok(removed.is_some())
    }

    pub fn replace_all(&self, records: &[T]) -> Result<()> {
        self.storage.write(T::COLLECTION, &records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Note {
        id: String,
        body: String,
    }

    impl Record for Note {
        const COLLECTION: &'static str = "notes";
        const ENTITY: &'static str = "Note";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: id.into(),
            body: body.into(),
        }
    }

    fn seeded() -> Vec<Note> {
        vec![note("1", "first")]
    }

    #[test]
    fn test_seed_then_crud() {
        let notes = Collection::new(Storage::memory(), seeded);
        assert_eq!(notes.all().unwrap(), seeded());

        notes.insert(note("2", "second")).unwrap();
        assert!(notes.insert(note("2", "dup")).is_err());
        assert_eq!(notes.all().unwrap().len(), 2);

        let edited = notes
            .modify("2", |n| {
                n.body = "edited".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(edited.unwrap().body, "edited");
        assert!(notes.modify("missing", |_| Ok(())).unwrap().is_none());

        assert!(notes.remove("1").unwrap());
        assert!(!notes.remove("1").unwrap());
        assert_eq!(notes.all().unwrap(), vec![note("2", "edited")]);
    }

    #[test]
    fn test_failed_modify_leaves_collection_unchanged() {
        let notes = Collection::new(Storage::memory(), seeded);
        let result = notes.modify("1", |n| {
            n.body = "half-done".into();
            Err(CrmError::Validation("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(notes.get("1").unwrap().unwrap().body, "first");
    }
}
