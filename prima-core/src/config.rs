use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::ConfigurationError;
use crate::strategy::{RoutePlannerKind, SolverKind, StrategyDescriptor};

/// A named coordination strategy applied to simulation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentConfiguration {
    pub name: String,
    pub strategy: StrategyDescriptor,
}

impl ExperimentConfiguration {
    #[must_use]
    pub fn new(name: impl Into<String>, strategy: StrategyDescriptor) -> Self {
        Self {
            name: name.into(),
            strategy,
        }
    }

    /// Central cheapest-insertion solver.
    #[must_use]
    pub fn cheapest_insertion() -> Self {
        Self::new(
            "CheapInsert",
            StrategyDescriptor::Central {
                solver: SolverKind::CheapestInsertion,
            },
        )
    }

    /// Central random solver.
    #[must_use]
    pub fn random() -> Self {
        Self::new(
            "Random",
            StrategyDescriptor::Central {
                solver: SolverKind::Random,
            },
        )
    }

    /// Auction with a 2-opt over cheapest-insertion route planner and a
    /// cheapest-insertion bidder per vehicle.
    #[must_use]
    pub fn auction_opt2_cheapest_insertion() -> Self {
        Self::new(
            "Auction-R-opt2cih-B-cih",
            StrategyDescriptor::Auction {
                route_planner: RoutePlannerKind::Opt2 {
                    solver: SolverKind::CheapestInsertion,
                },
                bidder: SolverKind::CheapestInsertion,
            },
        )
    }
}

/// Immutable, insertion-ordered set of configurations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRegistry {
    configurations: Vec<ExperimentConfiguration>,
}

/// Collects configurations and validates them once in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    configurations: Vec<ExperimentConfiguration>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn add(mut self, configuration: ExperimentConfiguration) -> Self {
        self.configurations.push(configuration);
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// Rejects an empty registry, empty or duplicate names, and names that
    /// cannot serve as a report file name.
    pub fn build(self) -> Result<ConfigurationRegistry, ConfigurationError> {
        if self.configurations.is_empty() {
            return Err(ConfigurationError::Empty);
        }
        let mut seen = HashSet::new();
        for configuration in &self.configurations {
            validate_name(&configuration.name)?;
            if !seen.insert(configuration.name.as_str()) {
                return Err(ConfigurationError::DuplicateName {
                    name: configuration.name.clone(),
                });
            }
        }
        Ok(ConfigurationRegistry {
            configurations: self.configurations,
        })
    }
}

fn validate_name(name: &str) -> Result<(), ConfigurationError> {
    if name.trim().is_empty() {
        return Err(ConfigurationError::EmptyName);
    }
    let unsafe_name = name == "."
        || name == ".."
        || name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control());
    if unsafe_name {
        return Err(ConfigurationError::UnsafeName {
            name: name.to_string(),
        });
    }
    Ok(())
}

impl ConfigurationRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The standard experiment: cheapest insertion, random, and the auction.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            configurations: vec![
                ExperimentConfiguration::cheapest_insertion(),
                ExperimentConfiguration::random(),
                ExperimentConfiguration::auction_opt2_cheapest_insertion(),
            ],
        }
    }

    /// Parse a JSON array of configurations.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or on any [`RegistryBuilder::build`] violation.
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let configurations: Vec<ExperimentConfiguration> =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Parse {
                reason: e.to_string(),
            })?;
        configurations
            .into_iter()
            .fold(Self::builder(), RegistryBuilder::add)
            .build()
    }

    /// Load a registry from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not describe a valid registry.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigurationError::Parse {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }

    /// Serialize to the JSON form accepted by [`from_json`](Self::from_json).
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.configurations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExperimentConfiguration> {
        self.configurations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExperimentConfiguration> {
        self.configurations.iter().find(|c| c.name == name)
    }

    /// Registration index of `name`, the canonical configuration order.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.configurations.iter().position(|c| c.name == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.configurations.iter().map(|c| c.name.as_str()).collect()
    }

    /// Sub-registry holding `names`, kept in this registry's order.
    ///
    /// # Errors
    ///
    /// Fails on an unknown name or when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Self, ConfigurationError> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(ConfigurationError::Unknown {
                name: unknown.clone(),
            });
        }
        self.configurations
            .iter()
            .filter(|c| names.contains(&c.name))
            .cloned()
            .fold(Self::builder(), RegistryBuilder::add)
            .build()
    }
}

impl<'a> IntoIterator for &'a ConfigurationRegistry {
    type Item = &'a ExperimentConfiguration;
    type IntoIter = std::slice::Iter<'a, ExperimentConfiguration>;

    fn into_iter(self) -> Self::IntoIter {
        self.configurations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_registration_order() {
        let registry = ConfigurationRegistry::defaults();
        assert_eq!(
            registry.names(),
            vec!["CheapInsert", "Random", "Auction-R-opt2cih-B-cih"]
        );
        assert_eq!(registry.position("Random"), Some(1));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = ConfigurationRegistry::builder()
            .add(ExperimentConfiguration::random())
            .add(ExperimentConfiguration::random())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateName {
                name: "Random".to_string()
            }
        );
    }

    #[test]
    fn rejects_empty_and_path_like_names() {
        let strategy = ExperimentConfiguration::random().strategy;
        let empty = ConfigurationRegistry::builder()
            .add(ExperimentConfiguration::new(" ", strategy))
            .build();
        assert_eq!(empty, Err(ConfigurationError::EmptyName));
        let nested = ConfigurationRegistry::builder()
            .add(ExperimentConfiguration::new("a/b", strategy))
            .build();
        assert!(matches!(nested, Err(ConfigurationError::UnsafeName { .. })));
        assert_eq!(
            ConfigurationRegistry::builder().build(),
            Err(ConfigurationError::Empty)
        );
    }

    #[test]
    fn select_keeps_registry_order() {
        let registry = ConfigurationRegistry::defaults();
        let subset = registry
            .select(&["Random".to_string(), "CheapInsert".to_string()])
            .unwrap();
        assert_eq!(subset.names(), vec!["CheapInsert", "Random"]);
        assert!(matches!(
            registry.select(&["Nope".to_string()]),
            Err(ConfigurationError::Unknown { .. })
        ));
    }

    #[test]
    fn json_round_trip_preserves_registry() {
        let registry = ConfigurationRegistry::defaults();
        let json = registry.to_json().unwrap();
        assert_eq!(ConfigurationRegistry::from_json(&json).unwrap(), registry);
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        assert!(matches!(
            ConfigurationRegistry::from_json("[{\"name\": 3}]"),
            Err(ConfigurationError::Parse { .. })
        ));
    }
}
