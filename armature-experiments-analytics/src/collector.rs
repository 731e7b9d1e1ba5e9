//! Data collectors
//!
//! Collectors subscribe to `participation.variant_run` and accumulate the
//! decisions of one request for later rendering or flushing.

use armature_experiments::{ParticipationEvent, Subscriber, SubscriberError, expect_variant_run};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// Experiment option holding the Google Content Experiments id
pub const EXPERIMENT_ID: &str = "experimentId";

/// Insertion-ordered map; re-inserting a key keeps its position
#[derive(Debug)]
struct Ordered<V> {
    entries: Mutex<Vec<(String, V)>>,
}

impl<V: Clone> Ordered<V> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn insert(&self, key: String, value: V) {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    fn snapshot(&self) -> Vec<(String, V)> {
        self.entries.lock().clone()
    }
}

/// Records experiment identifier → variant identifier.
///
/// # Examples
///
/// ```
/// use armature_experiments_analytics::GenericCollector;
///
/// let collector = GenericCollector::new();
/// collector.add_participation("headline", "short");
///
/// assert_eq!(
///     collector.tests_data(),
///     vec![("headline".to_string(), "short".to_string())]
/// );
/// ```
#[derive(Debug)]
pub struct GenericCollector {
    participations: Ordered<String>,
}

impl GenericCollector {
    pub fn new() -> Self {
        Self {
            participations: Ordered::new(),
        }
    }

    pub fn add_participation(&self, test: impl Into<String>, variant: impl Into<String>) {
        self.participations.insert(test.into(), variant.into());
    }

    /// Collected participations in the order they were first seen
    pub fn tests_data(&self) -> Vec<(String, String)> {
        self.participations.snapshot()
    }
}

impl Default for GenericCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for GenericCollector {
    fn subscribed_events(&self) -> Vec<&'static str> {
        vec![ParticipationEvent::VARIANT_RUN]
    }

    fn handle(&self, event: &ParticipationEvent<'_>) -> Result<(), SubscriberError> {
        let (registration, variant) = expect_variant_run(event)?;
        let test = registration.experiment().id();

        debug!(experiment = test, variant = variant.id(), "Collected participation");
        self.add_participation(test, variant.id());
        Ok(())
    }
}

/// Records Google experiment id → 0-based position of the chosen variant.
///
/// The experiment must carry its Google id in the [`EXPERIMENT_ID`]
/// option.
#[derive(Debug)]
pub struct GoogleCollector {
    participations: Ordered<usize>,
}

impl GoogleCollector {
    pub fn new() -> Self {
        Self {
            participations: Ordered::new(),
        }
    }

    pub fn add_participation(&self, experiment_id: impl Into<String>, variation_index: usize) {
        self.participations
            .insert(experiment_id.into(), variation_index);
    }

    /// Collected participations in the order they were first seen
    pub fn tests_data(&self) -> Vec<(String, usize)> {
        self.participations.snapshot()
    }
}

impl Default for GoogleCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for GoogleCollector {
    fn subscribed_events(&self) -> Vec<&'static str> {
        vec![ParticipationEvent::VARIANT_RUN]
    }

    fn handle(&self, event: &ParticipationEvent<'_>) -> Result<(), SubscriberError> {
        let (registration, variant) = expect_variant_run(event)?;
        let experiment = registration.experiment();

        let experiment_id = match experiment.option(EXPERIMENT_ID) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(other) => {
                return Err(SubscriberError::InvalidPayload(format!(
                    "option '{}' of test '{}' must be a string, got {}",
                    EXPERIMENT_ID,
                    experiment.id(),
                    other
                )));
            }
            None => {
                return Err(SubscriberError::MissingOption {
                    test: experiment.id().to_string(),
                    option: EXPERIMENT_ID.to_string(),
                });
            }
        };

        let index = experiment.position(variant.id()).ok_or_else(|| {
            SubscriberError::UnknownVariant {
                test: experiment.id().to_string(),
                variant: variant.id().to_string(),
            }
        })?;

        debug!(
            experiment = experiment.id(),
            experiment_id = %experiment_id,
            index,
            "Collected Google participation"
        );
        self.add_participation(experiment_id, index);
        Ok(())
    }
}
