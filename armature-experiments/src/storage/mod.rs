//! Participation storage
//!
//! A store keeps one record per experiment identifier. Records are
//! tri-state: absent (never decided), [`Participation::Excluded`]
//! (decided not to participate, never asked again) or
//! [`Participation::Variant`] (admitted and pinned to that variant).
//!
//! `has` is the authoritative existence check; an exclusion record is a
//! present value, not a missing one.
//!
//! # Backends
//!
//! - [`MemoryStorage`] - request-scoped in-memory map
//! - [`CookieStorage`] - client-side cookie (requires the `cookie` feature)

use crate::error::StorageResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod memory;

#[cfg(feature = "cookie")]
pub mod cookie;

pub use memory::MemoryStorage;

#[cfg(feature = "cookie")]
pub use cookie::{CookieConfig, CookieStorage, SameSite};

/// Stored decision for one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Participation {
    /// The user does not take part
    Excluded,
    /// The user is pinned to the variant with this identifier
    Variant(String),
}

impl Participation {
    /// Pin to a variant
    pub fn variant(id: impl Into<String>) -> Self {
        Self::Variant(id.into())
    }

    /// Identifier of the pinned variant, none when excluded
    pub fn variant_id(&self) -> Option<&str> {
        match self {
            Self::Excluded => None,
            Self::Variant(id) => Some(id),
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Excluded)
    }
}

impl From<Option<String>> for Participation {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) => Self::Variant(id),
            None => Self::Excluded,
        }
    }
}

impl From<Participation> for Option<String> {
    fn from(value: Participation) -> Self {
        match value {
            Participation::Excluded => None,
            Participation::Variant(id) => Some(id),
        }
    }
}

/// Snapshot of every stored record, keyed by experiment identifier.
pub type Participations = BTreeMap<String, Participation>;

/// Tri-state key-value store for participation records.
///
/// Implementations use interior mutability so one store can be shared
/// between the manager and the code that later flushes it.
pub trait Storage: Send + Sync {
    /// Whether a record exists for `id`, including exclusion records
    fn has(&self, id: &str) -> StorageResult<bool>;

    /// The record for `id`; `None` when absent
    fn get(&self, id: &str) -> StorageResult<Option<Participation>>;

    /// Store a record, replacing any previous one
    fn set(&self, id: &str, participation: Participation) -> StorageResult<()>;

    /// Remove a record and return it
    fn remove(&self, id: &str) -> StorageResult<Option<Participation>>;

    /// Every stored record
    fn all(&self) -> StorageResult<Participations>;

    /// Remove every record and return what was removed
    fn clear(&self) -> StorageResult<Participations>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn has(&self, id: &str) -> StorageResult<bool> {
        (**self).has(id)
    }

    fn get(&self, id: &str) -> StorageResult<Option<Participation>> {
        (**self).get(id)
    }

    fn set(&self, id: &str, participation: Participation) -> StorageResult<()> {
        (**self).set(id, participation)
    }

    fn remove(&self, id: &str) -> StorageResult<Option<Participation>> {
        (**self).remove(id)
    }

    fn all(&self) -> StorageResult<Participations> {
        (**self).all()
    }

    fn clear(&self) -> StorageResult<Participations> {
        (**self).clear()
    }
}
