//! A/B test participation for Armature
//!
//! This crate decides, once per request, whether the visiting user takes
//! part in each registered experiment and which variant they receive. The
//! decision is persisted so repeat visits stay consistent.
//!
//! ## Features
//!
//! - **Sticky assignment** - a user admitted to a variant keeps it
//! - **Pluggable strategies** - admission filters and variant choosers
//! - **Tri-state storage** - undecided, excluded, or pinned to a variant
//! - **Typed events** - subscribers observe every decision
//! - **Cookie storage** - client-side persistence (`cookie` feature)
//!
//! ## Quick Start
//!
//! ```
//! use armature_experiments::*;
//! use std::sync::Arc;
//!
//! let dispatcher = EventDispatcher::new();
//! dispatcher.add_listener(ParticipationEvent::VARIANT_RUN, |event| {
//!     if let Some(variant) = event.variant() {
//!         println!("{} -> {}", event.registration().experiment().id(), variant.id());
//!     }
//!     Ok(())
//! });
//!
//! let mut engine = Engine::new(
//!     ParticipationManager::new(MemoryStorage::new()),
//!     Arc::new(dispatcher),
//! )
//! .with_filter(Arc::new(Percentage::new(50)?))
//! .with_chooser(Arc::new(RandomChooser::new()));
//!
//! engine.add_test(
//!     Experiment::new("headline")?
//!         .with_variants(vec![Variant::simple("short"), Variant::simple("long")])?,
//! )?;
//!
//! for decision in engine.start()? {
//!     println!("{:?}", decision);
//! }
//! # Ok::<(), ExperimentError>(())
//! ```
//!
//! ## Storage
//!
//! ```
//! use armature_experiments::{Participation, ParticipationManager, MemoryStorage};
//!
//! // A user excluded on an earlier visit is never asked again
//! let manager = ParticipationManager::new(MemoryStorage::with_data([
//!     ("headline", Participation::Excluded),
//! ]));
//! assert!(manager.participates("headline")?);
//! assert_eq!(manager.participating_variant("headline")?, None);
//! # Ok::<(), armature_experiments::StorageError>(())
//! ```
//!
//! ## Configuration
//!
//! ```
//! use armature_experiments::{ChooserConfig, Engine, ExperimentsConfig, MemoryStorage, ParticipationManager};
//! use std::sync::Arc;
//!
//! let config = ExperimentsConfig::builder()
//!     .default_percentage(100)
//!     .default_chooser(ChooserConfig::Random)
//!     .seed(42)
//!     .build();
//!
//! let engine = Engine::from_config(
//!     &config,
//!     ParticipationManager::new(MemoryStorage::new()),
//!     Arc::new(config.event_dispatcher()),
//! )?;
//! # Ok::<(), armature_experiments::ExperimentError>(())
//! ```

pub mod chooser;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod event;
pub mod experiment;
pub mod filter;
pub mod participation;
pub mod random;
pub mod registration;
pub mod storage;
pub mod variant;

pub use chooser::{ChoiceKey, RandomChooser, StaticChooser, VariantChooser};
pub use config::{ChooserConfig, ExperimentsConfig, ExperimentsConfigBuilder};
pub use dispatcher::{
    Dispatcher, DispatcherConfig, EventDispatcher, EventDispatcherBuilder, Listener,
    NullDispatcher,
};
pub use engine::{Decision, Engine, ExperimentEngine};
pub use error::{
    DispatchError, ExperimentError, ExperimentResult, StorageError, StorageResult,
    SubscriberError,
};
pub use event::{ParticipationEvent, Subscriber, expect_variant_run};
pub use experiment::{Experiment, Options};
pub use filter::{ParticipationFilter, Percentage};
pub use participation::ParticipationManager;
pub use random::{FixedRandom, RandomSource, SeededRandom, ThreadRandom};
pub use registration::Registration;
pub use storage::{MemoryStorage, Participation, Participations, Storage};
pub use variant::{Variant, VariantEffect, VariantRunner};

#[cfg(feature = "cookie")]
pub use storage::{CookieConfig, CookieStorage, SameSite};
