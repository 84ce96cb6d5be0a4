//! Engine configuration.
//!
//! Limits that keep resolution finite, the names of the collection
//! classifiers used for multibindings, and the candidate ranking policy.
//! Values can be loaded from environment variables, from any
//! [`ConfigSource`], or (with the `config` feature) from JSON.

use std::collections::BTreeMap;
use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::engine::{RankingPolicy, RankingRule};
use crate::error::{InjectError, InjectResult};
use crate::types::UNIQUE_NAME_LIMIT;

/// Prefix used by [`EngineConfig::from_env`]
pub const ENV_PREFIX: &str = "INJECT";

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Parses a raw string the way environment variables are read
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            ConfigValue::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Strictly positive integer
    pub fn as_limit(&self) -> Option<usize> {
        self.as_i64().filter(|v| *v > 0).map(|v| v as usize)
    }

    /// Comma-separated string or array of strings
    pub fn as_list(&self) -> Option<Vec<String>> {
        match self {
            ConfigValue::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            ConfigValue::Array(items) => items
                .iter()
                .map(|item| item.as_string().map(str::to_string))
                .collect(),
            _ => None,
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// List all available keys
    fn keys(&self) -> Vec<String>;
}

/// Environment variable configuration source
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    /// Prefix to filter environment variables
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        let env_key = if let Some(prefix) = &self.prefix {
            format!("{}_{}", prefix.to_uppercase(), key.to_uppercase())
        } else {
            key.to_uppercase()
        };

        env::var(&env_key).ok().map(|value| ConfigValue::parse(&value))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| {
                if let Some(prefix) = &self.prefix {
                    let prefix_upper = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix_upper).map(str::to_lowercase)
                } else {
                    Some(key.to_lowercase())
                }
            })
            .collect()
    }
}

/// In-memory source, mostly for tests and embedding hosts
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: BTreeMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Limits and policy for one [`Resolver`](crate::Resolver).
///
/// ```rust
/// use ferrous_inject::{ConfigValue, EngineConfig, MapConfigSource};
///
/// let source = MapConfigSource::new()
///     .set("max_depth", ConfigValue::Integer(32))
///     .set("ranking", ConfigValue::String("exact_match, scope_nearness".into()));
/// let config = EngineConfig::from_source(&source).unwrap();
///
/// assert_eq!(config.max_depth, 32);
/// assert_eq!(config.max_visited_types, EngineConfig::default().max_visited_types);
/// assert_eq!(config.ranking.rules().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Deepest in-progress request stack
    pub max_depth: usize,
    /// Distinct types one resolution may request
    pub max_visited_types: usize,
    /// Spread provider instances one resolution may create
    pub max_spread_instantiations: usize,
    /// Bundle instantiations one flattening may expand
    pub max_bundle_instantiations: usize,
    pub unique_name_limit: usize,
    /// Fully-qualified name of the set classifier for set multibindings
    pub set_classifier: String,
    /// Fully-qualified name of the map classifier for map multibindings
    pub map_classifier: String,
    pub ranking: RankingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_visited_types: 4096,
            max_spread_instantiations: 1024,
            max_bundle_instantiations: 512,
            unique_name_limit: UNIQUE_NAME_LIMIT,
            set_classifier: "Set".to_string(),
            map_classifier: "Map".to_string(),
            ranking: RankingPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Loads every known key from `source`, keeping defaults for the rest
    pub fn from_source(source: &dyn ConfigSource) -> InjectResult<Self> {
        let mut config = Self::default();

        let limits: [(&str, &mut usize); 5] = [
            ("max_depth", &mut config.max_depth),
            ("max_visited_types", &mut config.max_visited_types),
            ("max_spread_instantiations", &mut config.max_spread_instantiations),
            ("max_bundle_instantiations", &mut config.max_bundle_instantiations),
            ("unique_name_limit", &mut config.unique_name_limit),
        ];
        for (key, slot) in limits {
            if let Some(value) = source.get(key) {
                *slot = value.as_limit().ok_or_else(|| invalid(key, "expected a positive integer"))?;
            }
        }

        for (key, slot) in [
            ("set_classifier", &mut config.set_classifier),
            ("map_classifier", &mut config.map_classifier),
        ] {
            if let Some(value) = source.get(key) {
                let name = value
                    .as_string()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid(key, "expected a classifier name"))?;
                *slot = name.to_string();
            }
        }

        if let Some(value) = source.get("ranking") {
            let names = value
                .as_list()
                .ok_or_else(|| invalid("ranking", "expected a list of rule names"))?;
            let rules = names
                .iter()
                .map(|name| {
                    RankingRule::parse(name).ok_or_else(|| invalid("ranking", &format!("unknown rule '{}'", name)))
                })
                .collect::<InjectResult<Vec<_>>>()?;
            config.ranking = RankingPolicy::new(rules);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads `INJECT_*` environment variables
    pub fn from_env() -> InjectResult<Self> {
        Self::from_source(&EnvironmentConfigSource::with_prefix(ENV_PREFIX))
    }

    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> InjectResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| invalid("json", &e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero limits and a ranking policy that repeats a rule
    pub fn validate(&self) -> InjectResult<()> {
        let limits = [
            ("max_depth", self.max_depth),
            ("max_visited_types", self.max_visited_types),
            ("max_spread_instantiations", self.max_spread_instantiations),
            ("max_bundle_instantiations", self.max_bundle_instantiations),
            ("unique_name_limit", self.unique_name_limit),
        ];
        if let Some((key, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(invalid(key, "must be greater than zero"));
        }

        let rules = self.ranking.rules();
        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].contains(rule) {
                return Err(invalid("ranking", &format!("rule '{}' listed twice", rule.name())));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> InjectError {
    InjectError::InvalidConfig {
        key: key.to_string(),
        message: message.to_string(),
    }
}
