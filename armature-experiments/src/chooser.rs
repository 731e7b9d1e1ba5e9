//! Variant choosers
//!
//! Choosers pick the variant an admitted user receives. They never mutate
//! the variant set and are safe to share between registrations.

use crate::random::{RandomSource, thread_random};
use crate::variant::Variant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Variant selection strategy.
pub trait VariantChooser: Send + Sync {
    /// Pick one of `variants`, or none
    fn choose_variant<'a>(&self, variants: &'a [Variant]) -> Option<&'a Variant>;
}

/// Picks a uniformly random variant by position.
#[derive(Clone)]
pub struct RandomChooser {
    random: Arc<dyn RandomSource>,
}

impl RandomChooser {
    pub fn new() -> Self {
        Self::with_random(thread_random())
    }

    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }
}

impl Default for RandomChooser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomChooser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomChooser").finish_non_exhaustive()
    }
}

impl VariantChooser for RandomChooser {
    fn choose_variant<'a>(&self, variants: &'a [Variant]) -> Option<&'a Variant> {
        if variants.is_empty() {
            return None;
        }

        let last = u32::try_from(variants.len() - 1).unwrap_or(u32::MAX);
        let index = self.random.between(0, last) as usize;
        variants.get(index)
    }
}

/// Key a [`StaticChooser`] looks up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceKey {
    /// 0-based position
    Index(usize),
    /// Variant identifier
    Identifier(String),
}

impl From<usize> for ChoiceKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ChoiceKey {
    fn from(id: &str) -> Self {
        Self::Identifier(id.to_string())
    }
}

impl From<String> for ChoiceKey {
    fn from(id: String) -> Self {
        Self::Identifier(id)
    }
}

/// Always picks the same variant; for forced rollouts and tests.
///
/// # Examples
///
/// ```
/// use armature_experiments::{StaticChooser, Variant, VariantChooser};
///
/// let variants = vec![Variant::simple("control"), Variant::simple("treatment")];
///
/// let by_index = StaticChooser::index(1);
/// assert_eq!(by_index.choose_variant(&variants).map(|v| v.id()), Some("treatment"));
///
/// let by_id = StaticChooser::new("control");
/// assert_eq!(by_id.choose_variant(&variants).map(|v| v.id()), Some("control"));
///
/// assert!(StaticChooser::new("gone").choose_variant(&variants).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticChooser {
    choice: ChoiceKey,
}

impl StaticChooser {
    pub fn new(choice: impl Into<ChoiceKey>) -> Self {
        Self {
            choice: choice.into(),
        }
    }

    /// Pick the variant at `index`
    pub fn index(index: usize) -> Self {
        Self::new(ChoiceKey::Index(index))
    }

    /// Pick the variant identified by `id`
    pub fn identifier(id: impl Into<String>) -> Self {
        Self::new(ChoiceKey::Identifier(id.into()))
    }

    pub fn choice(&self) -> &ChoiceKey {
        &self.choice
    }
}

impl VariantChooser for StaticChooser {
    fn choose_variant<'a>(&self, variants: &'a [Variant]) -> Option<&'a Variant> {
        match &self.choice {
            ChoiceKey::Index(index) => variants.get(*index),
            ChoiceKey::Identifier(id) => variants.iter().find(|v| v.id() == id),
        }
    }
}
