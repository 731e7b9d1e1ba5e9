//! Variants: the treatments a participant can receive.

use std::fmt;
use std::sync::Arc;

/// Custom variant behaviour.
pub trait VariantRunner: Send + Sync {
    /// Apply the treatment for the current request.
    fn run(&self);
}

/// What happens when a variant is activated.
#[derive(Clone, Default)]
pub enum VariantEffect {
    /// Nothing; the caller inspects the decision instead
    #[default]
    NoOp,
    /// Invoke a closure
    Callback(Arc<dyn Fn() + Send + Sync>),
    /// Delegate to a custom runner
    Custom(Arc<dyn VariantRunner>),
}

impl fmt::Debug for VariantEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => f.write_str("NoOp"),
            Self::Callback(_) => f.write_str("Callback"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// A single treatment within an experiment.
///
/// Identity is the identifier: two variants with the same identifier are
/// interchangeable for persistence and matching.
///
/// # Examples
///
/// ```
/// use armature_experiments::Variant;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = hits.clone();
/// let variant = Variant::callback("blue-button", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// variant.run();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Variant {
    id: String,
    effect: VariantEffect,
}

impl Variant {
    /// Create a variant with the given effect
    pub fn new(id: impl Into<String>, effect: VariantEffect) -> Self {
        Self {
            id: id.into(),
            effect,
        }
    }

    /// Create a variant that does nothing when run
    pub fn simple(id: impl Into<String>) -> Self {
        Self::new(id, VariantEffect::NoOp)
    }

    /// Create a variant that invokes `callback` when run
    pub fn callback<F>(id: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(id, VariantEffect::Callback(Arc::new(callback)))
    }

    /// Create a variant backed by a custom runner
    pub fn custom(id: impl Into<String>, runner: Arc<dyn VariantRunner>) -> Self {
        Self::new(id, VariantEffect::Custom(runner))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn effect(&self) -> &VariantEffect {
        &self.effect
    }

    /// Run the variant's effect.
    pub fn run(&self) {
        match &self.effect {
            VariantEffect::NoOp => {}
            VariantEffect::Callback(callback) => callback(),
            VariantEffect::Custom(runner) => runner.run(),
        }
    }
}

impl AsRef<str> for Variant {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variant {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRunner {
        runs: AtomicUsize,
    }

    impl VariantRunner for CountingRunner {
        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_simple_variant() {
        let variant = Variant::simple("v1");
        assert_eq!(variant.id(), "v1");
        assert!(matches!(variant.effect(), VariantEffect::NoOp));
        variant.run();
    }

    #[test]
    fn test_callback_variant_runs_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let variant = Variant::callback("v1", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        variant.run();
        variant.run();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_custom_variant_delegates() {
        let runner = Arc::new(CountingRunner {
            runs: AtomicUsize::new(0),
        });
        let variant = Variant::custom("v1", runner.clone());

        variant.run();
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_identity_is_identifier() {
        let a = Variant::simple("same");
        let b = Variant::callback("same", || {});
        assert_eq!(a, b);
        assert_ne!(a, Variant::simple("other"));
    }
}
