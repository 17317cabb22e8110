//! Trace state for one harness run
//!
//! A `TraceState` is created per run, owned exclusively by the harness for
//! the run's duration, and discarded or exported once terminal. It carries
//! the scenario, the injection descriptor, the clean and corrupted outputs,
//! and the tag/metadata blocks the exporter attaches for dashboard filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::injection::Injection;
use crate::scenario::Scenario;

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    /// Created, graph not yet started
    Pending,
    /// Graph is executing
    Running,
    /// Graph finished and the injection transform was applied
    Completed,
    /// Graph raised an unrecoverable fault
    Failed,
}

/// One recorded graph step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Node name
    pub name: String,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Whether the node succeeded
    pub success: bool,
}

impl StepRecord {
    /// Record a successful step
    pub fn success(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            success: true,
        }
    }

    /// Record a failed step
    pub fn failure(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            success: false,
        }
    }
}

/// The structured record of one agent execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceState {
    /// Unique run identifier
    pub run_id: String,

    /// Session identifier (`tracegen-<scenario.id>-<run_id[..8]>`)
    pub session_id: String,

    /// Scenario used for this run
    pub scenario: Scenario,

    /// Injection used for this run
    pub injection: Injection,

    /// Simulated caller, for multi-tenant trace attribution
    pub user_id: String,

    /// The model's unmodified response, retained for audit/debugging
    pub raw_output: Option<String>,

    /// The response surfaced after the injection transform, what the judge sees
    pub output: Option<String>,

    /// Derived tag equal to the injection mode, for dashboard filtering
    pub failure_label: String,

    /// Lifecycle state
    pub status: TraceStatus,

    /// Graph steps recorded during execution
    #[serde(default)]
    pub steps: Vec<StepRecord>,

    /// When the run was created
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message if the run failed
    pub error: Option<String>,
}

impl TraceState {
    /// Create a new pending trace for one run
    pub fn new(scenario: Scenario, injection: Injection, user_id: impl Into<String>) -> Self {
        let run_id = Uuid::new_v4().to_string();
        let session_id = format!("tracegen-{}-{}", scenario.id, &run_id[..8]);
        let failure_label = injection.mode.to_string();

        Self {
            run_id,
            session_id,
            scenario,
            injection,
            user_id: user_id.into(),
            raw_output: None,
            output: None,
            failure_label,
            status: TraceStatus::Pending,
            steps: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Transition to `Running`
    pub(crate) fn begin(&mut self) {
        self.status = TraceStatus::Running;
    }

    /// Transition to `Completed` with the corrupted output populated
    pub(crate) fn complete(&mut self, raw_output: String, output: String) {
        self.raw_output = Some(raw_output);
        self.output = Some(output);
        self.status = TraceStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Transition to `Failed`, preserving whatever raw output was captured
    pub(crate) fn fail(&mut self, error: impl Into<String>, raw_output: Option<String>) {
        if raw_output.is_some() {
            self.raw_output = raw_output;
        }
        self.error = Some(error.into());
        self.status = TraceStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Whether the run reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TraceStatus::Completed | TraceStatus::Failed)
    }

    /// Export tag set: scenario tags plus classification and failure tags
    pub fn tags(&self) -> Vec<String> {
        let mut tags = self.scenario.tags.clone();
        tags.push(format!("scenario:{}", self.scenario.category));
        tags.push(format!("difficulty:{}", self.scenario.difficulty));
        tags.push(format!("failure:{}", self.injection.mode));
        tags.push(format!("variant:{}", self.injection.variant));
        tags
    }

    /// Nested metadata block attached to the exported trace
    pub fn metadata(&self) -> Value {
        json!({
            "run_id": self.run_id,
            "session_id": self.session_id,
            "user_id": self.user_id,
            "scenario": {
                "id": self.scenario.id,
                "name": self.scenario.name,
                "category": self.scenario.category,
                "difficulty": self.scenario.difficulty,
                "prompt": self.scenario.prompt,
            },
            "expectations": {
                "expected_behavior": self.scenario.expected_behavior,
                "ground_truth": self.scenario.ground_truth,
            },
            "injection": {
                "mode": self.injection.mode,
                "variant": self.injection.variant,
                "injector_version": self.injection.injector_version,
            },
            "judge": {
                "rubric_id": self.scenario.judge_rubric_id,
                "criteria": self.scenario.judge_criteria,
            },
        })
    }

    /// Flat attribute map for span-level filtering
    pub fn attributes(&self) -> Vec<(String, Value)> {
        vec![
            ("demo.run_id".to_string(), json!(self.run_id)),
            ("demo.scenario_id".to_string(), json!(self.scenario.id)),
            (
                "demo.ground_truth".to_string(),
                json!(self.scenario.ground_truth),
            ),
            (
                "demo.failure_mode".to_string(),
                json!(self.injection.mode.to_string()),
            ),
            ("demo.variant".to_string(), json!(self.injection.variant)),
            (
                "judge_rubric_id".to_string(),
                json!(self.scenario.judge_rubric_id),
            ),
            (
                "judge_criteria".to_string(),
                json!(self.scenario.judge_criteria),
            ),
        ]
    }
}
