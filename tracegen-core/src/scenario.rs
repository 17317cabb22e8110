//! Scenario catalog for trace generation
//!
//! A scenario is a reusable, immutable test case: prompt, ground truth,
//! expected behavior, and a reference to the judge rubric that scores it.
//! The `ScenarioRegistry` is built once at startup and read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, TracegenError};

/// An evaluation scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Classification (e.g. "math", "factual", "support")
    pub category: String,

    /// Difficulty label (e.g. "easy", "medium", "hard")
    pub difficulty: String,

    /// Input text sent to the model
    pub prompt: String,

    /// Reference answer or expected fact, used for judge comparison
    pub ground_truth: String,

    /// Free-text description of correct behavior
    pub expected_behavior: String,

    /// Reference to an external rubric definition
    pub judge_rubric_id: String,

    /// Named evaluation dimensions (e.g. truthfulness, tone)
    #[serde(default)]
    pub judge_criteria: Vec<String>,

    /// Free-form labels for filtering
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Scenario {
    /// Whether this scenario carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether the scenario requires structured JSON output.
    ///
    /// Signalled by a `format:json` tag; the format-violation transform
    /// uses this to decide how to break the output contract.
    pub fn requires_json_output(&self) -> bool {
        self.has_tag("format:json")
    }
}

/// Filter for scenario listing
#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    /// Scenarios must carry all of these tags
    pub tags: Vec<String>,
    /// Scenarios must be in this category
    pub category: Option<String>,
}

impl ScenarioFilter {
    /// Create an empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Require a category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn matches(&self, scenario: &Scenario) -> bool {
        if let Some(ref category) = self.category
            && scenario.category != *category
        {
            return false;
        }
        self.tags.iter().all(|t| scenario.has_tag(t))
    }
}

/// Read-only catalog of evaluation scenarios.
///
/// Built once from a scenario list or a JSON file; exposes lookup and
/// insertion-ordered listing, no mutation after load.
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    scenarios: Vec<Scenario>,
    by_id: HashMap<String, usize>,
}

impl ScenarioRegistry {
    /// Build a registry from a list of scenarios.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if two scenarios share an id.
    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(scenarios.len());
        for (idx, scenario) in scenarios.iter().enumerate() {
            if by_id.insert(scenario.id.clone(), idx).is_some() {
                return Err(TracegenError::Configuration(format!(
                    "Duplicate scenario id: '{}'",
                    scenario.id
                )));
            }
        }
        Ok(Self { scenarios, by_id })
    }

    /// Load a registry from a JSON file containing an array of scenarios
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let scenarios: Vec<Scenario> = serde_json::from_str(&content)?;
        Self::from_scenarios(scenarios)
    }

    /// Look up a scenario by id
    pub fn get(&self, id: &str) -> Result<&Scenario> {
        self.by_id
            .get(id)
            .map(|&idx| &self.scenarios[idx])
            .ok_or_else(|| TracegenError::ScenarioNotFound(id.to_string()))
    }

    /// Iterate over all scenarios in insertion order
    pub fn list(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    /// Iterate over scenarios matching a filter, insertion order preserved
    pub fn filter<'a>(
        &'a self,
        filter: &'a ScenarioFilter,
    ) -> impl Iterator<Item = &'a Scenario> + 'a {
        self.scenarios.iter().filter(move |s| filter.matches(s))
    }

    /// Number of registered scenarios
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// The built-in demo catalog.
    ///
    /// Four scenarios exercising the answer, factual, format, and tone
    /// failure axes. These anchor the acceptance tests and the CLI demo.
    pub fn builtin() -> Self {
        let scenarios = vec![
            Scenario {
                id: "math_multiplication".to_string(),
                name: "Two-digit multiplication".to_string(),
                category: "math".to_string(),
                difficulty: "easy".to_string(),
                prompt: "What is 27 multiplied by 19? Give the final answer.".to_string(),
                ground_truth: "513".to_string(),
                expected_behavior: "States the correct product with brief working".to_string(),
                judge_rubric_id: "rubric_arithmetic_v1".to_string(),
                judge_criteria: vec!["correctness".to_string()],
                tags: vec!["arithmetic".to_string()],
            },
            Scenario {
                id: "mars_landing".to_string(),
                name: "Mars landing fact check".to_string(),
                category: "factual".to_string(),
                difficulty: "easy".to_string(),
                prompt: "Has a human ever landed on Mars? Answer factually.".to_string(),
                ground_truth: "No human has landed on Mars.".to_string(),
                expected_behavior: "Correctly states that no crewed Mars landing has occurred"
                    .to_string(),
                judge_rubric_id: "rubric_factual_v1".to_string(),
                judge_criteria: vec!["truthfulness".to_string()],
                tags: vec!["space".to_string(), "fact_check".to_string()],
            },
            Scenario {
                id: "structured_answer".to_string(),
                name: "Structured JSON answer".to_string(),
                category: "format".to_string(),
                difficulty: "medium".to_string(),
                prompt: "What is the capital of France? Respond as JSON with keys \
                         \"answer\" and \"confidence\"."
                    .to_string(),
                ground_truth: "Paris".to_string(),
                expected_behavior: "Returns valid JSON with answer and confidence keys"
                    .to_string(),
                judge_rubric_id: "rubric_format_v1".to_string(),
                judge_criteria: vec!["format_compliance".to_string(), "correctness".to_string()],
                tags: vec!["format:json".to_string()],
            },
            Scenario {
                id: "support_tone".to_string(),
                name: "Customer support tone".to_string(),
                category: "support".to_string(),
                difficulty: "easy".to_string(),
                prompt: "My order arrived damaged. What should I do?".to_string(),
                ground_truth: "Apologize and explain the return/replacement process.".to_string(),
                expected_behavior: "Polite, empathetic reply with concrete next steps".to_string(),
                judge_rubric_id: "rubric_tone_v1".to_string(),
                judge_criteria: vec!["tone".to_string(), "helpfulness".to_string()],
                tags: vec!["customer_support".to_string()],
            },
        ];

        Self::from_scenarios(scenarios).expect("builtin catalog has unique ids")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(id: &str, category: &str, tags: &[&str]) -> Scenario {
        Scenario {
            id: id.to_string(),
            name: id.to_string(),
            category: category.to_string(),
            difficulty: "easy".to_string(),
            prompt: "prompt".to_string(),
            ground_truth: "truth".to_string(),
            expected_behavior: "behaves".to_string(),
            judge_rubric_id: "rubric".to_string(),
            judge_criteria: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_get_returns_registered_scenario() {
        let registry = ScenarioRegistry::builtin();

        for expected in registry.list() {
            let found = registry.get(&expected.id).unwrap();
            assert_eq!(found, expected);
            // Idempotent across repeated calls
            assert_eq!(registry.get(&expected.id).unwrap(), expected);
        }
    }

    #[test]
    fn test_get_unknown_id() {
        let registry = ScenarioRegistry::builtin();
        let err = registry.get("not_a_scenario").unwrap_err();
        assert!(matches!(err, TracegenError::ScenarioNotFound(_)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = ScenarioRegistry::from_scenarios(vec![
            scenario("dup", "a", &[]),
            scenario("dup", "b", &[]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_insertion_order() {
        let registry = ScenarioRegistry::from_scenarios(vec![
            scenario("first", "a", &[]),
            scenario("second", "a", &[]),
            scenario("third", "b", &[]),
        ])
        .unwrap();

        let ids: Vec<&str> = registry.list().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);

        // Restartable: a second pass yields the same sequence
        let ids_again: Vec<&str> = registry.list().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn test_filter_by_category_and_tag() {
        let registry = ScenarioRegistry::from_scenarios(vec![
            scenario("a", "math", &["easy_set"]),
            scenario("b", "math", &[]),
            scenario("c", "factual", &["easy_set"]),
        ])
        .unwrap();

        let filter = ScenarioFilter::new().with_category("math");
        let ids: Vec<&str> = registry.filter(&filter).map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let filter = ScenarioFilter::new().with_tag("easy_set");
        let ids: Vec<&str> = registry.filter(&filter).map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let filter = ScenarioFilter::new().with_category("math").with_tag("easy_set");
        let ids: Vec<&str> = registry.filter(&filter).map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_load_from_file() {
        let registry = ScenarioRegistry::builtin();
        let json = serde_json::to_string_pretty(&registry.list().collect::<Vec<_>>()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.json");
        std::fs::write(&path, json).unwrap();

        let loaded = ScenarioRegistry::load(&path).unwrap();
        assert_eq!(loaded.len(), registry.len());
        assert!(loaded.get("mars_landing").is_ok());
    }
}
