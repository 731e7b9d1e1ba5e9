//! Engine configuration
//!
//! Configuration can be built in code, deserialized, or read from the
//! environment:
//!
//! - `ARMATURE_AB_PERCENTAGE`: default admission percentage (0-100)
//! - `ARMATURE_AB_CHOOSER`: `random` or `static:<index-or-identifier>`
//! - `ARMATURE_AB_SEED`: seed for a deterministic randomness provider
//! - `ARMATURE_AB_COOKIE_NAME`: participation cookie name
//! - `ARMATURE_AB_COOKIE_TTL`: participation cookie lifetime in seconds (negative for a session cookie)

use crate::chooser::{ChoiceKey, RandomChooser, StaticChooser, VariantChooser};
use crate::dispatcher::{DispatcherConfig, EventDispatcher};
use crate::error::{ExperimentError, ExperimentResult};
use crate::filter::{ParticipationFilter, Percentage};
use crate::random::{RandomSource, SeededRandom, thread_random};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "cookie")]
use crate::storage::CookieConfig;

/// Engine-level default chooser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChooserConfig {
    /// [`RandomChooser`]
    Random,
    /// [`StaticChooser`] on a fixed key
    Static { key: ChoiceKey },
}

impl ChooserConfig {
    /// Build the chooser, drawing from `random` where needed
    pub fn build(&self, random: Arc<dyn RandomSource>) -> Arc<dyn VariantChooser> {
        match self {
            Self::Random => Arc::new(RandomChooser::with_random(random)),
            Self::Static { key } => Arc::new(StaticChooser::new(key.clone())),
        }
    }
}

impl FromStr for ChooserConfig {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("random") {
            return Ok(Self::Random);
        }

        match s.split_once(':') {
            Some((kind, key)) if kind.eq_ignore_ascii_case("static") && !key.is_empty() => {
                let key = match key.parse::<usize>() {
                    Ok(index) => ChoiceKey::Index(index),
                    Err(_) => ChoiceKey::Identifier(key.to_string()),
                };
                Ok(Self::Static { key })
            }
            _ => Err(ExperimentError::Configuration(format!(
                "unknown chooser '{}', expected 'random' or 'static:<key>'",
                s
            ))),
        }
    }
}

/// Configuration for the experiment engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExperimentsConfig {
    /// Admission percentage applied when a test has no filter of its own
    pub default_percentage: Option<i32>,
    /// Chooser applied when a test has no chooser of its own
    pub default_chooser: Option<ChooserConfig>,
    /// Seed for the default strategies; unseeded uses the thread generator
    pub seed: Option<u64>,
    /// Event dispatcher behaviour
    pub dispatcher: DispatcherConfig,
    /// Participation cookie settings
    #[cfg(feature = "cookie")]
    pub cookie: CookieConfig,
}

impl ExperimentsConfig {
    /// Create a new configuration builder
    pub fn builder() -> ExperimentsConfigBuilder {
        ExperimentsConfigBuilder::default()
    }

    /// Create config from environment variables.
    ///
    /// Unset variables keep their defaults; malformed values are rejected.
    pub fn from_env() -> ExperimentResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ExperimentResult<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("ARMATURE_AB_PERCENTAGE") {
            config.default_percentage = Some(parse_var("ARMATURE_AB_PERCENTAGE", &value)?);
        }

        if let Some(value) = lookup("ARMATURE_AB_CHOOSER") {
            config.default_chooser = Some(value.parse()?);
        }

        if let Some(value) = lookup("ARMATURE_AB_SEED") {
            config.seed = Some(parse_var("ARMATURE_AB_SEED", &value)?);
        }

        #[cfg(feature = "cookie")]
        {
            if let Some(name) = lookup("ARMATURE_AB_COOKIE_NAME") {
                if name.trim().is_empty() {
                    return Err(ExperimentError::Configuration(
                        "ARMATURE_AB_COOKIE_NAME must not be empty".to_string(),
                    ));
                }
                config.cookie.name = name.trim().to_string();
            }

            // negative means a session cookie
            if let Some(value) = lookup("ARMATURE_AB_COOKIE_TTL") {
                let ttl: i64 = parse_var("ARMATURE_AB_COOKIE_TTL", &value)?;
                config.cookie.ttl_secs = u64::try_from(ttl).ok();
                config.cookie.validate().map_err(|e| {
                    ExperimentError::Configuration(format!("ARMATURE_AB_COOKIE_TTL: {}", e))
                })?;
            }
        }

        Ok(config)
    }

    /// Randomness provider shared by the default strategies
    pub fn random(&self) -> Arc<dyn RandomSource> {
        match self.seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => thread_random(),
        }
    }

    /// Build the default filter, if one is configured
    pub fn filter(
        &self,
        random: Arc<dyn RandomSource>,
    ) -> ExperimentResult<Option<Arc<dyn ParticipationFilter>>> {
        self.default_percentage
            .map(|probability| {
                Percentage::with_random(probability, random)
                    .map(|filter| Arc::new(filter) as Arc<dyn ParticipationFilter>)
            })
            .transpose()
    }

    /// Build the default chooser, if one is configured
    pub fn chooser(&self, random: Arc<dyn RandomSource>) -> Option<Arc<dyn VariantChooser>> {
        self.default_chooser
            .as_ref()
            .map(|chooser| chooser.build(random))
    }

    /// Build an event dispatcher with the configured behaviour
    pub fn event_dispatcher(&self) -> EventDispatcher {
        EventDispatcher::with_config(self.dispatcher.clone())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> ExperimentResult<T> {
    value.trim().parse().map_err(|_| {
        ExperimentError::Configuration(format!("invalid value '{}' for {}", value, key))
    })
}

/// Builder for ExperimentsConfig
#[derive(Debug, Default)]
pub struct ExperimentsConfigBuilder {
    config: ExperimentsConfig,
}

impl ExperimentsConfigBuilder {
    pub fn default_percentage(mut self, probability: i32) -> Self {
        self.config.default_percentage = Some(probability);
        self
    }

    pub fn default_chooser(mut self, chooser: ChooserConfig) -> Self {
        self.config.default_chooser = Some(chooser);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.config.dispatcher.continue_on_error = enabled;
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.dispatcher.enable_logging = enabled;
        self
    }

    #[cfg(feature = "cookie")]
    pub fn cookie(mut self, cookie: CookieConfig) -> Self {
        self.config.cookie = cookie;
        self
    }

    pub fn build(self) -> ExperimentsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ExperimentsConfig::default();
        assert_eq!(config.default_percentage, None);
        assert_eq!(config.default_chooser, None);
        assert_eq!(config.seed, None);
        assert!(!config.dispatcher.continue_on_error);
    }

    #[test]
    fn test_builder() {
        let config = ExperimentsConfig::builder()
            .default_percentage(50)
            .default_chooser(ChooserConfig::Random)
            .seed(42)
            .continue_on_error(true)
            .build();

        assert_eq!(config.default_percentage, Some(50));
        assert_eq!(config.default_chooser, Some(ChooserConfig::Random));
        assert_eq!(config.seed, Some(42));
        assert!(config.dispatcher.continue_on_error);
    }

    #[test]
    fn test_chooser_from_str() {
        assert_eq!("random".parse::<ChooserConfig>().unwrap(), ChooserConfig::Random);
        assert_eq!(
            "static:1".parse::<ChooserConfig>().unwrap(),
            ChooserConfig::Static {
                key: ChoiceKey::Index(1)
            }
        );
        assert_eq!(
            "static:control".parse::<ChooserConfig>().unwrap(),
            ChooserConfig::Static {
                key: ChoiceKey::Identifier("control".to_string())
            }
        );
        assert!("static:".parse::<ChooserConfig>().is_err());
        assert!("weighted".parse::<ChooserConfig>().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = ExperimentsConfig::from_lookup(lookup(&[
            ("ARMATURE_AB_PERCENTAGE", "25"),
            ("ARMATURE_AB_CHOOSER", "static:0"),
            ("ARMATURE_AB_SEED", "7"),
        ]))
        .unwrap();

        assert_eq!(config.default_percentage, Some(25));
        assert_eq!(
            config.default_chooser,
            Some(ChooserConfig::Static {
                key: ChoiceKey::Index(0)
            })
        );
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let err = ExperimentsConfig::from_lookup(lookup(&[("ARMATURE_AB_PERCENTAGE", "half")]))
            .unwrap_err();
        assert!(matches!(err, ExperimentError::Configuration(_)));

        let err =
            ExperimentsConfig::from_lookup(lookup(&[("ARMATURE_AB_SEED", "-1")])).unwrap_err();
        assert!(matches!(err, ExperimentError::Configuration(_)));
    }

    #[cfg(feature = "cookie")]
    #[test]
    fn test_cookie_from_lookup() {
        let config = ExperimentsConfig::from_lookup(lookup(&[
            ("ARMATURE_AB_COOKIE_NAME", "ab"),
            ("ARMATURE_AB_COOKIE_TTL", "3600"),
        ]))
        .unwrap();

        assert_eq!(config.cookie.name, "ab");
        assert_eq!(config.cookie.ttl_secs, Some(3600));

        assert!(
            ExperimentsConfig::from_lookup(lookup(&[("ARMATURE_AB_COOKIE_NAME", " ")])).is_err()
        );
    }

    #[cfg(feature = "cookie")]
    #[test]
    fn test_cookie_ttl_from_lookup() {
        let config =
            ExperimentsConfig::from_lookup(lookup(&[("ARMATURE_AB_COOKIE_TTL", "-1")])).unwrap();
        assert_eq!(config.cookie.ttl_secs, None);

        for ttl in ["18446744073709551615", "100000000000000000", "9000000000000000"] {
            let err = ExperimentsConfig::from_lookup(lookup(&[("ARMATURE_AB_COOKIE_TTL", ttl)]))
                .unwrap_err();
            assert!(matches!(err, ExperimentError::Configuration(_)));
        }
    }

    #[test]
    fn test_filter_validates_percentage() {
        let config = ExperimentsConfig::builder().default_percentage(150).build();
        let Err(err) = config.filter(config.random()) else {
            panic!("a percentage above 100 must be rejected");
        };
        assert!(matches!(err, ExperimentError::InvalidProbability(150)));

        assert!(ExperimentsConfig::default().filter(thread_random()).unwrap().is_none());
    }

    #[test]
    fn test_seeded_strategies_are_deterministic() {
        let config = ExperimentsConfig::builder()
            .default_chooser(ChooserConfig::Random)
            .seed(1234)
            .build();
        let variants: Vec<Variant> = (0..10).map(|i| Variant::simple(format!("v{}", i))).collect();

        let first = config.chooser(config.random()).unwrap();
        let second = config.chooser(config.random()).unwrap();
        for _ in 0..20 {
            assert_eq!(
                first.choose_variant(&variants).map(|v| v.id().to_string()),
                second.choose_variant(&variants).map(|v| v.id().to_string())
            );
        }
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExperimentsConfig = serde_json::from_str(
            r#"{"default_percentage": 10, "default_chooser": {"type": "static", "key": "b"}}"#,
        )
        .unwrap();

        assert_eq!(config.default_percentage, Some(10));
        assert_eq!(
            config.default_chooser,
            Some(ChooserConfig::Static {
                key: ChoiceKey::Identifier("b".to_string())
            })
        );
        assert_eq!(config.dispatcher, DispatcherConfig::default());
    }
}
