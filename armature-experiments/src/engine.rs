//! Participation decision engine
//!
//! The engine owns a table of [`Registration`]s and, once started, decides
//! for each of them whether the current user takes part and with which
//! variant. Every decision is persisted through the
//! [`ParticipationManager`] and announced through a [`Dispatcher`].
//!
//! Per registration, in registration order:
//!
//! 1. A stored exclusion emits `participation.blocked` and stops.
//! 2. An undecided user failing the filter is excluded, then
//!    `participation.block` is emitted.
//! 3. A stored variant that still exists is activated again.
//! 4. Otherwise the chooser picks a variant. When it picks none (or one the
//!    experiment does not contain), `participation.variant_missing` is
//!    emitted and the user is excluded. A valid pick is stored and
//!    activated.
//!
//! Activation emits `participation.variant_run` and then runs the variant.

use crate::chooser::VariantChooser;
use crate::config::ExperimentsConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ExperimentError, ExperimentResult, StorageResult};
use crate::event::ParticipationEvent;
use crate::experiment::{Experiment, Options};
use crate::filter::ParticipationFilter;
use crate::participation::ParticipationManager;
use crate::registration::Registration;
use crate::storage::{Participation, Storage};
use crate::variant::Variant;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Read-only view of an engine, carried by every event.
pub trait ExperimentEngine {
    /// Registered experiments in registration order
    fn tests(&self) -> Vec<&Experiment>;

    /// Look up a registered experiment
    fn test(&self, id: &str) -> ExperimentResult<&Experiment>;

    /// Whether [`Engine::start`] has been called
    fn is_locked(&self) -> bool;
}

/// Outcome of evaluating one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Excluded on an earlier visit
    Blocked { experiment: String },
    /// Turned away by the filter and excluded from now on
    Denied { experiment: String },
    /// No usable variant; excluded from now on
    VariantMissing { experiment: String },
    /// The variant ran; `resumed` when it came from storage
    Activated {
        experiment: String,
        variant: String,
        resumed: bool,
    },
}

impl Decision {
    pub fn experiment(&self) -> &str {
        match self {
            Self::Blocked { experiment }
            | Self::Denied { experiment }
            | Self::VariantMissing { experiment }
            | Self::Activated { experiment, .. } => experiment,
        }
    }

    /// Identifier of the activated variant
    pub fn variant(&self) -> Option<&str> {
        match self {
            Self::Activated { variant, .. } => Some(variant),
            _ => None,
        }
    }

    pub fn is_activated(&self) -> bool {
        matches!(self, Self::Activated { .. })
    }
}

/// The decision engine.
///
/// # Examples
///
/// ```
/// use armature_experiments::{
///     Engine, Experiment, MemoryStorage, NullDispatcher, ParticipationManager, Percentage,
///     StaticChooser, Variant,
/// };
/// use std::sync::Arc;
///
/// let mut engine = Engine::new(
///     ParticipationManager::new(MemoryStorage::new()),
///     Arc::new(NullDispatcher),
/// )
/// .with_filter(Arc::new(Percentage::new(100)?))
/// .with_chooser(Arc::new(StaticChooser::index(0)));
///
/// engine.add_test(
///     Experiment::new("checkout")?
///         .with_variants(vec![Variant::simple("one-page"), Variant::simple("wizard")])?,
/// )?;
///
/// let decisions = engine.start()?;
/// assert_eq!(decisions[0].variant(), Some("one-page"));
/// assert!(engine.manager().participates_with("checkout", "one-page")?);
/// # Ok::<(), armature_experiments::ExperimentError>(())
/// ```
pub struct Engine<S> {
    manager: ParticipationManager<S>,
    dispatcher: Arc<dyn Dispatcher>,
    filter: Option<Arc<dyn ParticipationFilter>>,
    chooser: Option<Arc<dyn VariantChooser>>,
    registrations: Vec<Registration>,
    index: HashMap<String, usize>,
    locked: bool,
}

impl<S: Storage> Engine<S> {
    /// Create an engine without default strategies
    pub fn new(manager: ParticipationManager<S>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            manager,
            dispatcher,
            filter: None,
            chooser: None,
            registrations: Vec::new(),
            index: HashMap::new(),
            locked: false,
        }
    }

    /// Create an engine whose defaults come from `config`
    pub fn from_config(
        config: &ExperimentsConfig,
        manager: ParticipationManager<S>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> ExperimentResult<Self> {
        let random = config.random();
        let mut engine = Self::new(manager, dispatcher);
        engine.filter = config.filter(Arc::clone(&random))?;
        engine.chooser = config.chooser(random);
        Ok(engine)
    }

    /// Default filter for tests registered without one
    pub fn with_filter(mut self, filter: Arc<dyn ParticipationFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Default chooser for tests registered without one
    pub fn with_chooser(mut self, chooser: Arc<dyn VariantChooser>) -> Self {
        self.chooser = Some(chooser);
        self
    }

    pub fn manager(&self) -> &ParticipationManager<S> {
        &self.manager
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.dispatcher.as_ref()
    }

    /// Register a test using the engine defaults
    pub fn add_test(&mut self, experiment: Experiment) -> ExperimentResult<()> {
        self.add_test_with(experiment, Options::new(), None, None)
    }

    /// Register a test with its own options and optional strategies.
    ///
    /// Missing strategies fall back to the engine defaults.
    pub fn add_test_with(
        &mut self,
        experiment: Experiment,
        options: Options,
        filter: Option<Arc<dyn ParticipationFilter>>,
        chooser: Option<Arc<dyn VariantChooser>>,
    ) -> ExperimentResult<()> {
        self.ensure_unlocked("tests cannot be added after the engine has started")?;

        let id = experiment.id().to_string();
        if self.index.contains_key(&id) {
            return Err(ExperimentError::DuplicateTest(id));
        }

        let filter = filter
            .or_else(|| self.filter.clone())
            .ok_or_else(|| ExperimentError::MissingFilter(id.clone()))?;
        let chooser = chooser
            .or_else(|| self.chooser.clone())
            .ok_or_else(|| ExperimentError::MissingChooser(id.clone()))?;

        debug!(
            experiment = %id,
            variants = experiment.variants().len(),
            "Registered test"
        );

        self.index.insert(id, self.registrations.len());
        self.registrations
            .push(Registration::new(experiment, filter, chooser, options));
        Ok(())
    }

    /// Registration for a test identifier
    pub fn registration(&self, id: &str) -> Option<&Registration> {
        self.index.get(id).map(|&i| &self.registrations[i])
    }

    /// All registrations in registration order
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Lock the engine and decide every registered test.
    ///
    /// Runs at most once; a second call fails with
    /// [`ExperimentError::EngineLocked`] without evaluating anything.
    pub fn start(&mut self) -> ExperimentResult<Vec<Decision>> {
        self.ensure_unlocked("the engine has already been started")?;
        self.locked = true;

        info!(tests = self.registrations.len(), "Engine locked, deciding participation");

        let engine: &Self = self;
        engine
            .registrations
            .iter()
            .map(|registration| engine.evaluate(registration))
            .collect()
    }

    fn ensure_unlocked(&self, reason: &'static str) -> ExperimentResult<()> {
        if self.locked {
            return Err(ExperimentError::EngineLocked(reason));
        }
        Ok(())
    }

    fn evaluate(&self, registration: &Registration) -> ExperimentResult<Decision> {
        let experiment = registration.experiment();
        let id = experiment.id();

        let stored = match self.storage(id, self.manager.participation(id))? {
            Some(Participation::Excluded) => {
                debug!(experiment = id, "Participation blocked by earlier exclusion");
                self.emit(ParticipationEvent::Blocked {
                    engine: self,
                    registration,
                })?;
                return Ok(Decision::Blocked {
                    experiment: id.to_string(),
                });
            }
            Some(Participation::Variant(variant)) => Some(variant),
            None => {
                if !registration.filter().should_participate() {
                    self.storage(id, self.manager.participate(id, None::<&str>))?;
                    debug!(experiment = id, "Participation denied by filter");
                    self.emit(ParticipationEvent::Block {
                        engine: self,
                        registration,
                    })?;
                    return Ok(Decision::Denied {
                        experiment: id.to_string(),
                    });
                }
                None
            }
        };

        if let Some(stored) = stored {
            if let Some(variant) = experiment.variant(&stored) {
                return self.activate(registration, variant, true);
            }
            debug!(
                experiment = id,
                variant = %stored,
                "Stored variant no longer exists, choosing again"
            );
        }

        let chosen = registration
            .chooser()
            .choose_variant(experiment.variants())
            .and_then(|chosen| experiment.variant(chosen.id()));

        let Some(variant) = chosen else {
            debug!(experiment = id, "No variant available");
            self.emit(ParticipationEvent::VariantMissing {
                engine: self,
                registration,
            })?;
            self.storage(id, self.manager.participate(id, None::<&str>))?;
            return Ok(Decision::VariantMissing {
                experiment: id.to_string(),
            });
        };

        self.storage(id, self.manager.participate(id, Some(variant.id())))?;
        self.activate(registration, variant, false)
    }

    fn activate(
        &self,
        registration: &Registration,
        variant: &Variant,
        resumed: bool,
    ) -> ExperimentResult<Decision> {
        let experiment = registration.experiment().id();
        debug!(experiment, variant = variant.id(), resumed, "Activating variant");

        self.emit(ParticipationEvent::VariantRun {
            engine: self,
            registration,
            variant,
        })?;
        variant.run();

        Ok(Decision::Activated {
            experiment: experiment.to_string(),
            variant: variant.id().to_string(),
            resumed,
        })
    }

    fn emit(&self, event: ParticipationEvent<'_>) -> ExperimentResult<()> {
        self.dispatcher.dispatch(&event)?;
        Ok(())
    }

    fn storage<T>(&self, experiment: &str, result: StorageResult<T>) -> ExperimentResult<T> {
        result.map_err(|e| {
            error!(experiment, error = %e, "Participation storage failed");
            ExperimentError::Storage(e)
        })
    }
}

impl<S: Storage> ExperimentEngine for Engine<S> {
    fn tests(&self) -> Vec<&Experiment> {
        self.registrations
            .iter()
            .map(Registration::experiment)
            .collect()
    }

    fn test(&self, id: &str) -> ExperimentResult<&Experiment> {
        self.registration(id)
            .map(Registration::experiment)
            .ok_or_else(|| ExperimentError::TestNotFound(id.to_string()))
    }

    fn is_locked(&self) -> bool {
        self.locked
    }
}

impl<S: fmt::Debug> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("manager", &self.manager)
            .field("registrations", &self.registrations)
            .field("has_default_filter", &self.filter.is_some())
            .field("has_default_chooser", &self.chooser.is_some())
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}
