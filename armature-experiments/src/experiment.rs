//! Experiments ("tests"): an identifier and an ordered set of variants.

use crate::error::{ExperimentError, ExperimentResult};
use crate::variant::Variant;
use std::collections::HashMap;

/// Opaque options read by external collaborators (e.g. a third-party experiment id).
pub type Options = HashMap<String, serde_json::Value>;

/// A named set of mutually exclusive variants.
///
/// Variants keep their insertion order and are unique by identifier.
///
/// # Examples
///
/// ```
/// use armature_experiments::{Experiment, Variant};
///
/// let experiment = Experiment::new("checkout-button")?
///     .with_variants(vec![Variant::simple("red"), Variant::simple("green")])?
///     .with_option("experimentId", "exp-123");
///
/// assert_eq!(experiment.position("green"), Some(1));
/// # Ok::<(), armature_experiments::ExperimentError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Experiment {
    id: String,
    variants: Vec<Variant>,
    options: Options,
}

impl Experiment {
    /// Create an experiment without variants.
    ///
    /// Fails with [`ExperimentError::InvalidIdentifier`] on an empty identifier.
    pub fn new(id: impl Into<String>) -> ExperimentResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ExperimentError::InvalidIdentifier);
        }

        Ok(Self {
            id,
            variants: Vec::new(),
            options: Options::new(),
        })
    }

    /// Add variants, in order
    pub fn with_variants(mut self, variants: Vec<Variant>) -> ExperimentResult<Self> {
        for variant in variants {
            self.insert_variant(variant)?;
        }
        Ok(self)
    }

    /// Set an option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Replace all options
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a variant, rejecting duplicate identifiers.
    pub fn add_variant(&mut self, variant: Variant) -> ExperimentResult<&mut Self> {
        self.insert_variant(variant)?;
        Ok(self)
    }

    /// Replace the variant set.
    ///
    /// On a duplicate within `variants` the previous set is kept.
    pub fn set_variants(&mut self, variants: Vec<Variant>) -> ExperimentResult<&mut Self> {
        let previous = std::mem::take(&mut self.variants);
        for variant in variants {
            if let Err(err) = self.insert_variant(variant) {
                self.variants = previous;
                return Err(err);
            }
        }
        Ok(self)
    }

    fn insert_variant(&mut self, variant: Variant) -> ExperimentResult<()> {
        if self.variant(variant.id()).is_some() {
            return Err(ExperimentError::DuplicateVariant {
                test: self.id.clone(),
                variant: variant.id().to_string(),
            });
        }

        self.variants.push(variant);
        Ok(())
    }

    /// Variants in insertion order
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id() == id)
    }

    /// 0-based position of a variant
    pub fn position(&self, id: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.id() == id)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.options.get(key)
    }
}

impl AsRef<str> for Experiment {
    fn as_ref(&self) -> &str {
        &self.id
    }
}
