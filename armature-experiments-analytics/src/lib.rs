//! Analytics integrations for Armature experiments
//!
//! Collectors subscribe to the engine's events and remember which variant
//! ran for each experiment; renderers turn that into a tracking script.
//!
//! ## Quick Start
//!
//! ```
//! use armature_experiments::*;
//! use armature_experiments_analytics::{GoogleCollector, GoogleUniversalAnalytics, ScriptRenderer, EXPERIMENT_ID};
//! use std::sync::Arc;
//!
//! let collector = Arc::new(GoogleCollector::new());
//! let dispatcher = EventDispatcher::builder()
//!     .subscriber(collector.clone())
//!     .build();
//!
//! let mut engine = Engine::new(
//!     ParticipationManager::new(MemoryStorage::new()),
//!     Arc::new(dispatcher),
//! )
//! .with_filter(Arc::new(Percentage::new(100)?))
//! .with_chooser(Arc::new(StaticChooser::index(1)));
//!
//! engine.add_test(
//!     Experiment::new("headline")?
//!         .with_variants(vec![Variant::simple("short"), Variant::simple("long")])?
//!         .with_option(EXPERIMENT_ID, "EXP_42"),
//! )?;
//! engine.start()?;
//!
//! let script = GoogleUniversalAnalytics::from(collector.as_ref())
//!     .with_api_client(true)
//!     .script();
//! assert!(script.contains("cxApi.setChosenVariation(1, 'EXP_42');"));
//! # Ok::<(), ExperimentError>(())
//! ```

pub mod collector;
pub mod renderer;

pub use collector::{EXPERIMENT_ID, GenericCollector, GoogleCollector};
pub use renderer::{
    API_CLIENT_SCRIPT, DEFAULT_EVENT_CATEGORY, GoogleClassicAnalytics, GoogleUniversalAnalytics,
    ScriptRenderer,
};
