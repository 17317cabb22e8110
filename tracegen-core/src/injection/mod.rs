//! Failure injection engine
//!
//! The engine owns the full table of (mode, variant) to corruption-transform
//! mappings and applies exactly one transform per run. Transforms are pure,
//! synchronous functions of `(raw_output, scenario)`, so any run is
//! reproducible for debugging and regression testing. The table is a lookup
//! structure rather than a branch chain, so new failure modes can be
//! registered without touching existing ones.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, TracegenError};
use crate::scenario::Scenario;

pub mod transforms;

pub use transforms::{
    ConfidentlyWrongTransform, FormatViolationTransform, HallucinationTransform,
    IdentityTransform, RefusalFailureTransform, RudeTransform,
};

/// The variant every mode registers by default
pub const BASELINE_VARIANT: &str = "baseline";

/// Enumerated failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Baseline/control: identity transform
    None,
    /// Fluent but incorrect final answer
    ConfidentlyWrong,
    /// Fabricated entities/facts contradicting the ground truth
    Hallucination,
    /// Informational content preserved, tone markers inverted
    Rude,
    /// Violates an implied structured-output contract
    FormatViolation,
    /// Answers requests that should have been refused
    RefusalFailure,
}

impl FailureMode {
    /// Stable string form, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::None => "none",
            FailureMode::ConfidentlyWrong => "confidently_wrong",
            FailureMode::Hallucination => "hallucination",
            FailureMode::Rude => "rude",
            FailureMode::FormatViolation => "format_violation",
            FailureMode::RefusalFailure => "refusal_failure",
        }
    }

    /// All known modes
    pub fn all() -> &'static [FailureMode] {
        &[
            FailureMode::None,
            FailureMode::ConfidentlyWrong,
            FailureMode::Hallucination,
            FailureMode::Rude,
            FailureMode::FormatViolation,
            FailureMode::RefusalFailure,
        ]
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureMode {
    type Err = TracegenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(FailureMode::None),
            "confidently_wrong" => Ok(FailureMode::ConfidentlyWrong),
            "hallucination" => Ok(FailureMode::Hallucination),
            "rude" => Ok(FailureMode::Rude),
            "format_violation" => Ok(FailureMode::FormatViolation),
            "refusal_failure" => Ok(FailureMode::RefusalFailure),
            other => Err(TracegenError::UnknownInjection {
                mode: other.to_string(),
                variant: BASELINE_VARIANT.to_string(),
            }),
        }
    }
}

/// The injection selected for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injection {
    /// Failure category
    pub mode: FailureMode,

    /// Variant selecting a specific corruption implementation within a mode
    pub variant: String,

    /// Version tag carried into trace metadata
    pub injector_version: String,
}

impl Default for Injection {
    fn default() -> Self {
        Self {
            mode: FailureMode::None,
            variant: BASELINE_VARIANT.to_string(),
            injector_version: "injector_v1".to_string(),
        }
    }
}

impl Injection {
    /// Create an injection with the baseline variant of a mode
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Select a specific variant
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }
}

/// A deterministic output-corruption function.
///
/// Transforms are scoped to a single failure category, require no knowledge
/// of other modes, and may read scenario fields (ground truth, implied
/// schema) to produce scenario-coherent corruptions. They must be
/// synchronous, side-effect-free, and bounded in time.
pub trait InjectionTransform: Send + Sync {
    /// Produce the corrupted output for a clean model response
    fn apply(&self, raw_output: &str, scenario: &Scenario) -> String;

    /// Short human-readable description of the corruption
    fn describe(&self) -> &str;
}

/// Shared handle to a registered transform
pub type TransformRef = Arc<dyn InjectionTransform>;

/// Registry of corruption transforms keyed by (mode, variant).
///
/// The identity transform is registered for `FailureMode::None` and cannot
/// be overridden; everything else is open for extension.
pub struct InjectionEngine {
    transforms: HashMap<(FailureMode, String), TransformRef>,
}

impl InjectionEngine {
    /// Create an engine with the built-in transform table
    pub fn new() -> Self {
        let mut engine = Self {
            transforms: HashMap::new(),
        };
        transforms::install_builtin(&mut engine);
        engine
    }

    /// Create an engine holding only the identity transform
    pub fn empty() -> Self {
        let mut engine = Self {
            transforms: HashMap::new(),
        };
        engine.transforms.insert(
            (FailureMode::None, BASELINE_VARIANT.to_string()),
            Arc::new(IdentityTransform),
        );
        engine
    }

    /// Register a transform for a (mode, variant) pair.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when attempting to override the identity
    /// transform for `FailureMode::None`, or when the pair is already
    /// registered.
    pub fn register(
        &mut self,
        mode: FailureMode,
        variant: impl Into<String>,
        transform: TransformRef,
    ) -> Result<()> {
        let variant = variant.into();
        if mode == FailureMode::None {
            return Err(TracegenError::Configuration(
                "The identity transform for mode 'none' is not overridable".to_string(),
            ));
        }
        let key = (mode, variant);
        if self.transforms.contains_key(&key) {
            return Err(TracegenError::Configuration(format!(
                "Transform already registered for mode '{}', variant '{}'",
                key.0, key.1
            )));
        }
        self.transforms.insert(key, transform);
        Ok(())
    }

    /// Resolve the transform for an injection.
    ///
    /// # Errors
    ///
    /// Returns `UnknownInjection` if the (mode, variant) pair has no
    /// registered implementation.
    pub fn resolve(&self, injection: &Injection) -> Result<TransformRef> {
        self.transforms
            .get(&(injection.mode, injection.variant.clone()))
            .cloned()
            .ok_or_else(|| TracegenError::UnknownInjection {
                mode: injection.mode.to_string(),
                variant: injection.variant.clone(),
            })
    }

    /// Apply a resolved transform to a clean model response
    pub fn apply(
        &self,
        transform: &TransformRef,
        raw_output: &str,
        scenario: &Scenario,
    ) -> String {
        transform.apply(raw_output, scenario)
    }

    /// List registered (mode, variant) pairs, sorted for stable display
    pub fn registered(&self) -> Vec<(FailureMode, String)> {
        let mut pairs: Vec<_> = self.transforms.keys().cloned().collect();
        pairs.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()).then(a.1.cmp(&b.1)));
        pairs
    }
}

impl Default for InjectionEngine {
    fn default() -> Self {
        Self::new()
    }
}
