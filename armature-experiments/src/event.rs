//! Participation events and the subscriber contract.
//!
//! The engine emits one event per decision it takes. Events are typed:
//! the variant is only present on events where a variant is activated,
//! so subscribers never inspect a positional payload.

use crate::engine::ExperimentEngine;
use crate::error::SubscriberError;
use crate::registration::Registration;
use crate::variant::Variant;
use std::fmt;

/// Event emitted by the engine while evaluating a registration.
#[derive(Clone, Copy)]
pub enum ParticipationEvent<'a> {
    /// The user was excluded on an earlier visit
    Blocked {
        engine: &'a dyn ExperimentEngine,
        registration: &'a Registration,
    },
    /// The admission filter just turned the user away
    Block {
        engine: &'a dyn ExperimentEngine,
        registration: &'a Registration,
    },
    /// No usable variant could be chosen
    VariantMissing {
        engine: &'a dyn ExperimentEngine,
        registration: &'a Registration,
    },
    /// A variant is about to run
    VariantRun {
        engine: &'a dyn ExperimentEngine,
        registration: &'a Registration,
        variant: &'a Variant,
    },
}

impl<'a> ParticipationEvent<'a> {
    pub const BLOCKED: &'static str = "participation.blocked";
    pub const BLOCK: &'static str = "participation.block";
    pub const VARIANT_MISSING: &'static str = "participation.variant_missing";
    pub const VARIANT_RUN: &'static str = "participation.variant_run";

    /// Every event name the engine emits
    pub const ALL: [&'static str; 4] = [
        Self::BLOCKED,
        Self::BLOCK,
        Self::VARIANT_MISSING,
        Self::VARIANT_RUN,
    ];

    /// Get event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blocked { .. } => Self::BLOCKED,
            Self::Block { .. } => Self::BLOCK,
            Self::VariantMissing { .. } => Self::VARIANT_MISSING,
            Self::VariantRun { .. } => Self::VARIANT_RUN,
        }
    }

    pub fn engine(&self) -> &'a dyn ExperimentEngine {
        match *self {
            Self::Blocked { engine, .. }
            | Self::Block { engine, .. }
            | Self::VariantMissing { engine, .. }
            | Self::VariantRun { engine, .. } => engine,
        }
    }

    pub fn registration(&self) -> &'a Registration {
        match *self {
            Self::Blocked { registration, .. }
            | Self::Block { registration, .. }
            | Self::VariantMissing { registration, .. }
            | Self::VariantRun { registration, .. } => registration,
        }
    }

    /// The activated variant; only set on [`VariantRun`](Self::VariantRun)
    pub fn variant(&self) -> Option<&'a Variant> {
        match *self {
            Self::VariantRun { variant, .. } => Some(variant),
            _ => None,
        }
    }
}

impl fmt::Debug for ParticipationEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ParticipationEvent");
        debug
            .field("name", &self.name())
            .field("experiment", &self.registration().experiment().id());
        if let Some(variant) = self.variant() {
            debug.field("variant", &variant.id());
        }
        debug.finish()
    }
}

/// Consumer of participation events (analytics collectors, renderers, ...).
pub trait Subscriber: Send + Sync {
    /// Names of the events this subscriber handles
    fn subscribed_events(&self) -> Vec<&'static str>;

    /// Handle one event.
    ///
    /// Implementations reject events that do not carry what they need
    /// instead of ignoring them.
    fn handle(&self, event: &ParticipationEvent<'_>) -> Result<(), SubscriberError>;
}

/// Extract the variant-run payload or fail.
pub fn expect_variant_run<'a>(
    event: &ParticipationEvent<'a>,
) -> Result<(&'a Registration, &'a Variant), SubscriberError> {
    match *event {
        ParticipationEvent::VariantRun {
            registration,
            variant,
            ..
        } => Ok((registration, variant)),
        other => Err(SubscriberError::InvalidPayload(format!(
            "expected '{}' event with a variant, got '{}'",
            ParticipationEvent::VARIANT_RUN,
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chooser::StaticChooser;
    use crate::error::ExperimentResult;
    use crate::experiment::{Experiment, Options};
    use crate::filter::Percentage;
    use std::sync::Arc;

    struct StubEngine;

    impl ExperimentEngine for StubEngine {
        fn tests(&self) -> Vec<&Experiment> {
            Vec::new()
        }

        fn test(&self, id: &str) -> ExperimentResult<&Experiment> {
            Err(crate::error::ExperimentError::TestNotFound(id.to_string()))
        }

        fn is_locked(&self) -> bool {
            true
        }
    }

    fn registration() -> Registration {
        let experiment = Experiment::new("t1")
            .unwrap()
            .with_variants(vec![Variant::simple("v1")])
            .unwrap();
        Registration::new(
            experiment,
            Arc::new(Percentage::new(100).unwrap()),
            Arc::new(StaticChooser::index(0)),
            Options::new(),
        )
    }

    #[test]
    fn test_event_names() {
        let engine = StubEngine;
        let registration = registration();
        let variant = Variant::simple("v1");

        let events = [
            ParticipationEvent::Blocked {
                engine: &engine,
                registration: &registration,
            },
            ParticipationEvent::Block {
                engine: &engine,
                registration: &registration,
            },
            ParticipationEvent::VariantMissing {
                engine: &engine,
                registration: &registration,
            },
            ParticipationEvent::VariantRun {
                engine: &engine,
                registration: &registration,
                variant: &variant,
            },
        ];

        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, ParticipationEvent::ALL.to_vec());
    }

    #[test]
    fn test_payload_accessors() {
        let engine = StubEngine;
        let registration = registration();
        let variant = Variant::simple("v1");

        let event = ParticipationEvent::VariantRun {
            engine: &engine,
            registration: &registration,
            variant: &variant,
        };
        assert_eq!(event.registration().experiment().id(), "t1");
        assert_eq!(event.variant().map(|v| v.id()), Some("v1"));
        assert!(event.engine().is_locked());

        let blocked = ParticipationEvent::Blocked {
            engine: &engine,
            registration: &registration,
        };
        assert!(blocked.variant().is_none());
    }

    #[test]
    fn test_expect_variant_run() {
        let engine = StubEngine;
        let registration = registration();
        let variant = Variant::simple("v1");

        let run = ParticipationEvent::VariantRun {
            engine: &engine,
            registration: &registration,
            variant: &variant,
        };
        let (found_registration, found_variant) = expect_variant_run(&run).unwrap();
        assert_eq!(found_registration.experiment().id(), "t1");
        assert_eq!(found_variant.id(), "v1");

        let missing = ParticipationEvent::VariantMissing {
            engine: &engine,
            registration: &registration,
        };
        assert!(matches!(
            expect_variant_run(&missing),
            Err(SubscriberError::InvalidPayload(_))
        ));
    }
}
