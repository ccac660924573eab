use std::collections::HashMap;

use crate::config::ConfigurationRegistry;
use crate::error::ConfigurationError;
use crate::runner::SimulationResult;

/// All results of one configuration, in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultGroup {
    pub configuration: String,
    pub results: Vec<SimulationResult>,
}

impl ResultGroup {
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Partitions results by configuration and restores a deterministic order.
pub struct ResultGrouper;

impl ResultGrouper {
    /// Group `results` by configuration name.
    ///
    /// Groups follow registry order and every registered configuration gets
    /// one, even when it has no results. Inside a group results are sorted by
    /// problem class, instance id, seed and repeat, so the output does not
    /// depend on the order results arrived in.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Unknown`] for a result whose configuration
    /// is not registered.
    pub fn group(
        registry: &ConfigurationRegistry,
        results: impl IntoIterator<Item = SimulationResult>,
    ) -> Result<Vec<ResultGroup>, ConfigurationError> {
        let mut buckets: Vec<Vec<SimulationResult>> = vec![Vec::new(); registry.len()];
        let index: HashMap<&str, usize> = registry
            .names()
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name, idx))
            .collect();

        for result in results {
            let Some(&slot) = index.get(result.run.configuration.as_str()) else {
                return Err(ConfigurationError::Unknown {
                    name: result.run.configuration,
                });
            };
            buckets[slot].push(result);
        }

        Ok(registry
            .iter()
            .zip(buckets)
            .map(|(configuration, mut results)| {
                results.sort_by(|a, b| {
                    a.run
                        .scenario
                        .canonical_cmp(&b.run.scenario)
                        .then_with(|| a.run.seed.cmp(&b.run.seed))
                        .then_with(|| a.run.repeat.cmp(&b.run.repeat))
                });
                ResultGroup {
                    configuration: configuration.name.clone(),
                    results,
                }
            })
            .collect())
    }
}
