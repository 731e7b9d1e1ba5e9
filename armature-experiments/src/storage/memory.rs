//! Request-scoped in-memory participation storage.

use super::{Participation, Participations, Storage};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory store; lives as long as the request (or the test) does.
///
/// # Examples
///
/// ```
/// use armature_experiments::{MemoryStorage, Participation, Storage};
///
/// let storage = MemoryStorage::with_data([("t1", Participation::Excluded)]);
///
/// assert!(storage.has("t1")?);
/// assert_eq!(storage.get("t1")?, Some(Participation::Excluded));
/// assert_eq!(storage.get("t2")?, None);
/// # Ok::<(), armature_experiments::StorageError>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Participation>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with records
    pub fn with_data<I, K>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, Participation)>,
        K: Into<String>,
    {
        let data = records
            .into_iter()
            .map(|(id, participation)| (id.into(), participation))
            .collect();

        Self {
            data: RwLock::new(data),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn has(&self, id: &str) -> StorageResult<bool> {
        Ok(self.data.read().contains_key(id))
    }

    fn get(&self, id: &str) -> StorageResult<Option<Participation>> {
        Ok(self.data.read().get(id).cloned())
    }

    fn set(&self, id: &str, participation: Participation) -> StorageResult<()> {
        self.data.write().insert(id.to_string(), participation);
        Ok(())
    }

    fn remove(&self, id: &str) -> StorageResult<Option<Participation>> {
        Ok(self.data.write().remove(id))
    }

    fn all(&self) -> StorageResult<Participations> {
        Ok(self
            .data
            .read()
            .iter()
            .map(|(id, participation)| (id.clone(), participation.clone()))
            .collect())
    }

    fn clear(&self) -> StorageResult<Participations> {
        let removed = std::mem::take(&mut *self.data.write());
        Ok(removed.into_iter().collect())
    }
}
