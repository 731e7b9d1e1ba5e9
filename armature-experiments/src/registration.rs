//! Registrations bind an experiment to the strategies that decide it.

use crate::chooser::VariantChooser;
use crate::experiment::{Experiment, Options};
use crate::filter::ParticipationFilter;
use std::fmt;
use std::sync::Arc;

/// One experiment together with its filter, chooser and options.
///
/// Immutable once built; owned by the engine's registration table.
#[derive(Clone)]
pub struct Registration {
    experiment: Experiment,
    filter: Arc<dyn ParticipationFilter>,
    chooser: Arc<dyn VariantChooser>,
    options: Options,
}

impl Registration {
    pub fn new(
        experiment: Experiment,
        filter: Arc<dyn ParticipationFilter>,
        chooser: Arc<dyn VariantChooser>,
        options: Options,
    ) -> Self {
        Self {
            experiment,
            filter,
            chooser,
            options,
        }
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn filter(&self) -> &dyn ParticipationFilter {
        self.filter.as_ref()
    }

    pub fn chooser(&self) -> &dyn VariantChooser {
        self.chooser.as_ref()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("experiment", &self.experiment.id())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
