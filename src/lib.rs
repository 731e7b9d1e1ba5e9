// Armature A/B - sticky experiment participation for Armature applications
//
// This library decides once per request which experiments a user takes part
// in and which variant they receive, and keeps that decision across visits.

// Re-export core functionality
pub use armature_experiments::*;

// Re-export optional crates
#[cfg(feature = "analytics")]
pub use armature_experiments_analytics as analytics;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Decision,
        Dispatcher,
        Engine,
        EventDispatcher,
        Experiment,
        ExperimentEngine,
        ExperimentError,
        ExperimentResult,
        ExperimentsConfig,
        MemoryStorage,
        NullDispatcher,
        Participation,
        ParticipationEvent,
        ParticipationFilter,
        ParticipationManager,
        Percentage,
        RandomChooser,
        StaticChooser,
        Storage,
        Subscriber,
        Variant,
        VariantChooser,
    };

    #[cfg(feature = "cookie")]
    pub use crate::{CookieConfig, CookieStorage};

    #[cfg(feature = "analytics")]
    pub use crate::analytics::{
        GenericCollector, GoogleClassicAnalytics, GoogleCollector, GoogleUniversalAnalytics,
        ScriptRenderer,
    };
}
