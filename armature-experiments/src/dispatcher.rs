//! Event dispatcher
//!
//! Routes participation events to listeners registered by event name.
//! Listeners for one name run in registration order, synchronously, on
//! the thread that drives the engine.

use crate::error::{DispatchError, SubscriberError};
use crate::event::{ParticipationEvent, Subscriber};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, trace, warn};

/// Callable invoked for a dispatched event.
pub type Listener =
    Arc<dyn Fn(&ParticipationEvent<'_>) -> Result<(), SubscriberError> + Send + Sync>;

/// Sink for participation events.
pub trait Dispatcher: Send + Sync {
    /// Deliver `event` to every listener registered under its name
    fn dispatch(&self, event: &ParticipationEvent<'_>) -> Result<(), DispatchError>;
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Keep invoking listeners after one fails
    pub continue_on_error: bool,

    /// Enable event logging
    pub enable_logging: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            enable_logging: true,
        }
    }
}

/// Name-keyed listener registry.
///
/// Cloning is cheap and clones share the same listeners.
///
/// # Examples
///
/// ```
/// use armature_experiments::{EventDispatcher, ParticipationEvent};
///
/// let dispatcher = EventDispatcher::new();
/// dispatcher.add_listener(ParticipationEvent::VARIANT_RUN, |event| {
///     println!("{} ran", event.registration().experiment().id());
///     Ok(())
/// });
///
/// assert_eq!(dispatcher.listener_count(ParticipationEvent::VARIANT_RUN), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<DashMap<String, Vec<Listener>>>,
    config: Arc<DispatcherConfig>,
    failures: Arc<AtomicUsize>,
}

impl EventDispatcher {
    /// Create new dispatcher
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// Create dispatcher with custom config
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            config: Arc::new(config),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn builder() -> EventDispatcherBuilder {
        EventDispatcherBuilder::new()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register a listener for an event name
    pub fn add_listener<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&ParticipationEvent<'_>) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let event = event.into();
        if self.config.enable_logging {
            debug!(event = %event, "Registered listener");
        }
        self.listeners
            .entry(event)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Register a subscriber for every event it declares
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) {
        for name in subscriber.subscribed_events() {
            let subscriber = Arc::clone(&subscriber);
            self.add_listener(name, move |event| subscriber.handle(event));
        }
    }

    /// Listener failures tolerated under `continue_on_error`, across all dispatches
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of listeners registered for an event name
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map(|l| l.len()).unwrap_or(0)
    }

    /// Remove all listeners for an event name
    pub fn remove_listeners(&self, event: &str) -> usize {
        let removed = self
            .listeners
            .remove(event)
            .map(|(_, listeners)| listeners.len())
            .unwrap_or(0);

        if self.config.enable_logging {
            debug!(event, removed, "Removed listeners");
        }
        removed
    }

    /// Clear all listeners
    pub fn clear(&self) {
        self.listeners.clear();
        if self.config.enable_logging {
            info!("Cleared all event listeners");
        }
    }
}

impl Dispatcher for EventDispatcher {
    fn dispatch(&self, event: &ParticipationEvent<'_>) -> Result<(), DispatchError> {
        let name = event.name();

        // Clone out of the map so listeners may register further listeners
        let listeners = match self.listeners.get(name) {
            Some(listeners) => listeners.clone(),
            None => {
                if self.config.enable_logging {
                    trace!(event = name, "No listeners registered");
                }
                return Ok(());
            }
        };

        if self.config.enable_logging {
            debug!(
                event = name,
                experiment = event.registration().experiment().id(),
                listeners = listeners.len(),
                "Dispatching event"
            );
        }

        let mut errors = Vec::new();
        for listener in &listeners {
            if let Err(e) = listener(event) {
                error!(event = name, error = %e, "Listener failed");
                errors.push(e);
                if !self.config.continue_on_error {
                    return Err(DispatchError::ListenersFailed {
                        event: name,
                        errors,
                    });
                }
            }
        }

        if !errors.is_empty() {
            self.failures.fetch_add(errors.len(), Ordering::Relaxed);
            warn!(
                event = name,
                failed = errors.len(),
                listeners = listeners.len(),
                "Listeners failed, continuing"
            );
        }

        Ok(())
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("EventDispatcher")
            .field("events", &events)
            .field("config", &self.config)
            .finish()
    }
}

/// Event dispatcher builder
#[derive(Default)]
pub struct EventDispatcherBuilder {
    config: DispatcherConfig,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl std::fmt::Debug for EventDispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcherBuilder")
            .field("config", &self.config)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventDispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable continue on error
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.config.continue_on_error = enabled;
        self
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Register a subscriber at build time
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn build(self) -> EventDispatcher {
        let dispatcher = EventDispatcher::with_config(self.config);
        for subscriber in self.subscribers {
            dispatcher.add_subscriber(subscriber);
        }
        dispatcher
    }
}

/// Dispatcher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn dispatch(&self, _event: &ParticipationEvent<'_>) -> Result<(), DispatchError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chooser::StaticChooser;
    use crate::engine::ExperimentEngine;
    use crate::error::{ExperimentError, ExperimentResult};
    use crate::experiment::{Experiment, Options};
    use crate::filter::Percentage;
    use crate::registration::Registration;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    struct StubEngine;

    impl ExperimentEngine for StubEngine {
        fn tests(&self) -> Vec<&Experiment> {
            Vec::new()
        }

        fn test(&self, id: &str) -> ExperimentResult<&Experiment> {
            Err(ExperimentError::TestNotFound(id.to_string()))
        }

        fn is_locked(&self) -> bool {
            true
        }
    }

    fn registration() -> Registration {
        Registration::new(
            Experiment::new("t1").unwrap(),
            Arc::new(Percentage::new(0).unwrap()),
            Arc::new(StaticChooser::index(0)),
            Options::new(),
        )
    }

    fn block_event<'a>(
        engine: &'a StubEngine,
        registration: &'a Registration,
    ) -> ParticipationEvent<'a> {
        ParticipationEvent::Block {
            engine,
            registration,
        }
    }

    struct CountingSubscriber {
        events: Vec<&'static str>,
        counter: AtomicU32,
    }

    impl Subscriber for CountingSubscriber {
        fn subscribed_events(&self) -> Vec<&'static str> {
            self.events.clone()
        }

        fn handle(&self, _event: &ParticipationEvent<'_>) -> Result<(), SubscriberError> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_listeners_run_in_order() {
        let dispatcher = EventDispatcher::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let calls = Arc::clone(&calls);
            dispatcher.add_listener(ParticipationEvent::BLOCK, move |_| {
                calls.lock().push(i);
                Ok(())
            });
        }

        let engine = StubEngine;
        let registration = registration();
        dispatcher
            .dispatch(&block_event(&engine, &registration))
            .unwrap();

        assert_eq!(*calls.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dispatch_without_listeners() {
        let engine = StubEngine;
        let registration = registration();
        assert!(
            EventDispatcher::new()
                .dispatch(&block_event(&engine, &registration))
                .is_ok()
        );
        assert!(
            NullDispatcher
                .dispatch(&block_event(&engine, &registration))
                .is_ok()
        );
    }

    #[test]
    fn test_only_matching_event_is_delivered() {
        let dispatcher = EventDispatcher::new();
        let subscriber = Arc::new(CountingSubscriber {
            events: vec![ParticipationEvent::VARIANT_RUN],
            counter: AtomicU32::new(0),
        });
        dispatcher.add_subscriber(subscriber.clone());

        let engine = StubEngine;
        let registration = registration();
        dispatcher
            .dispatch(&block_event(&engine, &registration))
            .unwrap();

        assert_eq!(subscriber.counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscriber_registers_each_event() {
        let dispatcher = EventDispatcher::builder()
            .subscriber(Arc::new(CountingSubscriber {
                events: vec![ParticipationEvent::BLOCK, ParticipationEvent::BLOCKED],
                counter: AtomicU32::new(0),
            }))
            .build();

        assert_eq!(dispatcher.listener_count(ParticipationEvent::BLOCK), 1);
        assert_eq!(dispatcher.listener_count(ParticipationEvent::BLOCKED), 1);
        assert_eq!(dispatcher.listener_count(ParticipationEvent::VARIANT_RUN), 0);
    }

    #[test]
    fn test_first_failure_aborts_by_default() {
        let dispatcher = EventDispatcher::new();
        let later = Arc::new(AtomicU32::new(0));

        dispatcher.add_listener(ParticipationEvent::BLOCK, |_| {
            Err(SubscriberError::InvalidPayload("boom".to_string()))
        });
        let counter = Arc::clone(&later);
        dispatcher.add_listener(ParticipationEvent::BLOCK, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let engine = StubEngine;
        let registration = registration();
        let err = dispatcher
            .dispatch(&block_event(&engine, &registration))
            .unwrap_err();

        let DispatchError::ListenersFailed { event, errors } = err;
        assert_eq!(event, ParticipationEvent::BLOCK);
        assert_eq!(errors.len(), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_continue_on_error_runs_remaining_listeners() {
        let dispatcher = EventDispatcher::builder()
            .continue_on_error(true)
            .build();
        let later = Arc::new(AtomicU32::new(0));

        dispatcher.add_listener(ParticipationEvent::BLOCK, |_| {
            Err(SubscriberError::InvalidPayload("boom".to_string()))
        });
        let counter = Arc::clone(&later);
        dispatcher.add_listener(ParticipationEvent::BLOCK, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let engine = StubEngine;
        let registration = registration();
        assert!(
            dispatcher
                .dispatch(&block_event(&engine, &registration))
                .is_ok()
        );
        assert_eq!(later.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.failure_count(), 1);

        dispatcher
            .dispatch(&block_event(&engine, &registration))
            .unwrap();
        assert_eq!(dispatcher.clone().failure_count(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let dispatcher = EventDispatcher::new();
        dispatcher.add_listener(ParticipationEvent::BLOCK, |_| Ok(()));
        dispatcher.add_listener(ParticipationEvent::BLOCK, |_| Ok(()));
        dispatcher.add_listener(ParticipationEvent::BLOCKED, |_| Ok(()));

        assert_eq!(dispatcher.remove_listeners(ParticipationEvent::BLOCK), 2);
        assert_eq!(dispatcher.listener_count(ParticipationEvent::BLOCK), 0);
        assert_eq!(dispatcher.remove_listeners("unknown"), 0);

        dispatcher.clear();
        assert_eq!(dispatcher.listener_count(ParticipationEvent::BLOCKED), 0);
    }

    #[test]
    fn test_clones_share_listeners() {
        let dispatcher = EventDispatcher::new();
        let clone = dispatcher.clone();
        clone.add_listener(ParticipationEvent::VARIANT_RUN, |_| Ok(()));

        assert_eq!(dispatcher.listener_count(ParticipationEvent::VARIANT_RUN), 1);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: DispatcherConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DispatcherConfig::default());
        assert!(!config.continue_on_error);
        assert!(config.enable_logging);
    }
}
