//! Named collection of the scenarios the CLI can run.

use std::collections::BTreeMap;

use super::Scenario;
use super::sample::{SampleSum, SampleSumSequential};

/// Scenarios keyed by [`Scenario::name`], listed in name order.
#[derive(Default)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<String, Box<dyn Scenario>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every scenario shipped with the library.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SampleSum::random());
        registry.register(SampleSumSequential::random());
        registry
    }

    /// Add `scenario`, replacing and returning any scenario of the same name.
    pub fn register(&mut self, scenario: impl Scenario + 'static) -> Option<Box<dyn Scenario>> {
        let name = scenario.name().to_owned();
        self.scenarios.insert(name, Box::new(scenario))
    }

    pub fn get(&self, name: &str) -> Option<&dyn Scenario> {
        self.scenarios.get(name).map(|s| s.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Scenario> {
        self.scenarios.values().map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl std::fmt::Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRegistry")
            .field("scenarios", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_in_name_order() {
        let registry = ScenarioRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["iphone.sample_sum", "iphone.sample_sum_sequential"]
        );
        assert!(registry.get("iphone.sample_sum").is_some());
        assert!(registry.get("ipad.sample_sum").is_none());
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = ScenarioRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(SampleSum::with_values(1, 2)).is_none());
        assert!(registry.register(SampleSum::with_values(3, 4)).is_some());
        assert_eq!(registry.len(), 1);
    }
}
