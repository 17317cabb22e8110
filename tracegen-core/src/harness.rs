//! Execution harness
//!
//! Orchestrates one graph run: binds scenario + injection + model into the
//! graph's initial state, drives execution to completion, applies the
//! corruption transform to the final model output, and finalizes the trace
//! for export. Each invocation is independent and owns its own trace, so
//! many runs may execute concurrently as long as the graph and model client
//! are themselves safe for concurrent use.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, RunFailure, TracegenError};
use crate::export::TraceExporter;
use crate::graph::{ExecutionGraph, GraphState};
use crate::injection::{Injection, InjectionEngine};
use crate::model::ModelClient;
use crate::scenario::{Scenario, ScenarioRegistry};
use crate::trace::TraceState;

/// Default upper bound on exporter time; export is best-effort
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// The injection-aware execution harness
pub struct TracegenHarness {
    engine: InjectionEngine,
    exporter: Option<Arc<dyn TraceExporter>>,
    export_timeout: Duration,
}

impl TracegenHarness {
    /// Create a harness with the built-in injection table and no exporter
    pub fn new() -> Self {
        Self {
            engine: InjectionEngine::new(),
            exporter: None,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }

    /// Use a custom injection engine
    pub fn with_engine(mut self, engine: InjectionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Attach a trace exporter
    pub fn with_exporter(mut self, exporter: Arc<dyn TraceExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Bound how long the harness waits on the exporter
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    /// The injection engine in use
    pub fn engine(&self) -> &InjectionEngine {
        &self.engine
    }

    /// Run one trace generation.
    ///
    /// The injection is resolved eagerly, so an unknown (mode, variant) pair
    /// fails before any model call is made. On graph failure the partial
    /// trace (status `Failed`, `raw_output` preserved when available) is
    /// carried inside the returned `RunFailure`.
    ///
    /// # Errors
    ///
    /// * `InvalidUserId` - empty user id
    /// * `UnknownInjection` - unresolvable (mode, variant), surfaced before
    ///   the graph is invoked
    /// * `Run` - the graph raised; carries the partial trace
    pub async fn run(
        &self,
        graph: &dyn ExecutionGraph,
        model: Arc<dyn ModelClient>,
        scenario: &Scenario,
        injection: Injection,
        user_id: &str,
    ) -> Result<TraceState> {
        if user_id.trim().is_empty() {
            return Err(TracegenError::InvalidUserId);
        }

        // Fail fast on configuration errors: no model round-trip is spent
        // on an unresolvable injection.
        let transform = self.engine.resolve(&injection)?;

        let mut trace = TraceState::new(scenario.clone(), injection.clone(), user_id);
        debug!(
            run_id = %trace.run_id,
            scenario = %scenario.id,
            mode = %injection.mode,
            variant = %injection.variant,
            "starting trace generation"
        );

        trace.begin();
        let initial = GraphState::new(model, scenario.clone(), injection);

        match graph.invoke(initial).await {
            Ok(final_state) => {
                trace.steps = final_state.steps;

                let Some(raw_output) = final_state.raw_model_output else {
                    trace.fail("graph completed without model output", None);
                    self.export_best_effort(&trace).await;
                    return Err(RunFailure::new(
                        "graph completed without model output",
                        trace,
                    )
                    .into());
                };

                let output = transform.apply(&raw_output, scenario);
                trace.complete(raw_output, output);

                info!(
                    run_id = %trace.run_id,
                    failure_label = %trace.failure_label,
                    "trace completed"
                );
                self.export_best_effort(&trace).await;
                Ok(trace)
            }
            Err(graph_failure) => {
                trace.steps = graph_failure.state.steps;
                trace.fail(&graph_failure.message, graph_failure.state.raw_model_output);

                warn!(
                    run_id = %trace.run_id,
                    error = %graph_failure.message,
                    "trace run failed"
                );
                self.export_best_effort(&trace).await;
                Err(RunFailure::new(graph_failure.message, trace).into())
            }
        }
    }

    /// Run a (scenario, injection) matrix, `repeat` runs per pair.
    ///
    /// Configuration-class errors (unknown scenario or injection) abort the
    /// batch; execution-class `RunFailure`s are collected and the batch
    /// continues with the next run.
    pub async fn run_batch(
        &self,
        graph: &dyn ExecutionGraph,
        model: Arc<dyn ModelClient>,
        registry: &ScenarioRegistry,
        pairs: &[(String, Injection)],
        repeat: usize,
        user_id: &str,
    ) -> Result<BatchOutcome> {
        // Validate the whole matrix up front so a typo cannot burn half a
        // batch of model calls.
        for (scenario_id, injection) in pairs {
            registry.get(scenario_id)?;
            self.engine.resolve(injection)?;
        }

        let mut outcome = BatchOutcome::default();
        for (scenario_id, injection) in pairs {
            let scenario = registry.get(scenario_id)?;
            for _ in 0..repeat {
                match self
                    .run(graph, Arc::clone(&model), scenario, injection.clone(), user_id)
                    .await
                {
                    Ok(trace) => outcome.completed.push(trace),
                    Err(TracegenError::Run(failure)) => outcome.failed.push(failure),
                    Err(other) => return Err(other),
                }
            }
        }
        Ok(outcome)
    }
}

impl Default for TracegenHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TracegenHarness {
    async fn export_best_effort(&self, trace: &TraceState) {
        let Some(exporter) = &self.exporter else {
            return;
        };

        match tokio::time::timeout(self.export_timeout, exporter.export(trace)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(run_id = %trace.run_id, error = %e, "trace export failed");
            }
            Err(_) => {
                warn!(
                    run_id = %trace.run_id,
                    timeout_ms = self.export_timeout.as_millis() as u64,
                    "trace export timed out"
                );
            }
        }
    }
}

/// Result of a batch run
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Traces that completed (including intentional injected failures)
    pub completed: Vec<TraceState>,
    /// Runs that failed at the infrastructure level
    pub failed: Vec<RunFailure>,
}

impl BatchOutcome {
    /// Total number of runs attempted
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Run one trace generation with a default harness.
///
/// Convenience wrapper for callers that do not need a custom engine or
/// exporter.
pub async fn run_tracegen(
    graph: &dyn ExecutionGraph,
    model: Arc<dyn ModelClient>,
    scenario: &Scenario,
    injection: Injection,
    user_id: &str,
) -> Result<TraceState> {
    TracegenHarness::new()
        .run(graph, model, scenario, injection, user_id)
        .await
}
