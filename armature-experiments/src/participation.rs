//! Participation manager
//!
//! Thin wrapper over a [`Storage`] that accepts either identifiers or
//! experiment/variant values and answers the questions the engine asks.

use crate::error::StorageResult;
use crate::storage::{Participation, Storage};

/// Reads and writes participation decisions.
///
/// Every method accepts anything that is `AsRef<str>`: a plain identifier,
/// an [`Experiment`](crate::Experiment) or a [`Variant`](crate::Variant).
///
/// # Examples
///
/// ```
/// use armature_experiments::{MemoryStorage, ParticipationManager};
///
/// let manager = ParticipationManager::new(MemoryStorage::new());
///
/// manager.participate("t1", None::<&str>)?;
/// assert!(manager.participates("t1")?);
/// assert_eq!(manager.participating_variant("t1")?, None);
///
/// manager.participate("t2", Some("v1"))?;
/// assert!(manager.participates_with("t2", "v1")?);
/// # Ok::<(), armature_experiments::StorageError>(())
/// ```
#[derive(Debug)]
pub struct ParticipationManager<S> {
    storage: S,
}

impl<S: Storage> ParticipationManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// The stored record, `None` when no decision was ever made
    pub fn participation(&self, experiment: impl AsRef<str>) -> StorageResult<Option<Participation>> {
        let id = experiment.as_ref();
        if !self.storage.has(id)? {
            return Ok(None);
        }
        self.storage.get(id)
    }

    /// Identifier of the variant the user is pinned to.
    ///
    /// `None` both when no decision exists and when the user is excluded;
    /// use [`participates`](Self::participates) to tell the two apart.
    pub fn participating_variant(&self, experiment: impl AsRef<str>) -> StorageResult<Option<String>> {
        Ok(self
            .participation(experiment)?
            .and_then(|participation| participation.variant_id().map(str::to_string)))
    }

    /// Whether any decision exists, exclusion included
    pub fn participates(&self, experiment: impl AsRef<str>) -> StorageResult<bool> {
        self.storage.has(experiment.as_ref())
    }

    /// Whether the user is pinned to exactly `variant`
    pub fn participates_with(
        &self,
        experiment: impl AsRef<str>,
        variant: impl AsRef<str>,
    ) -> StorageResult<bool> {
        Ok(self
            .participation(experiment)?
            .is_some_and(|participation| participation.variant_id() == Some(variant.as_ref())))
    }

    /// Record a decision; `None` records an exclusion
    pub fn participate<V: AsRef<str>>(
        &self,
        experiment: impl AsRef<str>,
        variant: Option<V>,
    ) -> StorageResult<()> {
        let participation = match variant {
            Some(variant) => Participation::variant(variant.as_ref()),
            None => Participation::Excluded,
        };
        self.storage.set(experiment.as_ref(), participation)
    }
}
