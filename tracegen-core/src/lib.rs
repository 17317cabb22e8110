//! # Tracegen - Injection-Aware Trace Generation for LLM Agent Evaluation
//!
//! Tracegen produces labeled traces for LLM-as-judge evaluation and
//! observability dashboards: given a scenario (prompt, ground truth, judge
//! rubric) and an injection (a failure mode to deliberately introduce), the
//! harness drives an agent execution graph, corrupts the final model output
//! with a deterministic, mode-selected transform, and emits a structured
//! trace carrying both the corrupted output and the metadata that explains
//! why it failed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracegen_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = ScenarioRegistry::builtin();
//!     let scenario = registry.get("mars_landing")?;
//!
//!     let graph = compile_graph();
//!     let model = Arc::new(OpenAiClient::new("sk-...", "gpt-4o-mini"));
//!
//!     let harness = TracegenHarness::new();
//!     let trace = harness
//!         .run(
//!             &graph,
//!             model,
//!             scenario,
//!             Injection::new(FailureMode::Hallucination),
//!             "demo_user",
//!         )
//!         .await?;
//!
//!     println!("{}", trace.output.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Scenario Registry**: immutable catalog of evaluation scenarios
//! - **Injection Engine**: deterministic corruption transforms looked up
//!   by (mode, variant)
//! - **Trace State**: the per-run record accumulating outputs and metadata
//! - **Execution Harness**: one graph run, injection applied at the final
//!   model-output boundary
//! - **Trace Exporter**: best-effort forwarding to an observability backend
//!
//! The same scenario can be run under different injections to produce the
//! "same prompt, different outcomes" comparison pattern; repeated runs of
//! the same (scenario, injection, raw output) are bit-identical because
//! transforms carry no hidden randomness.

pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod harness;
pub mod injection;
pub mod model;
pub mod scenario;
pub mod trace;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ExportConfig, ModelConfig, TracegenConfig};
    pub use crate::error::{Result, RunFailure, TracegenError};
    pub use crate::export::{
        HttpExporter, JsonLinesExporter, OtelSpan, SpanStatus, TraceExporter, TraceFormat,
        render, to_otel_spans, to_summary,
    };
    pub use crate::graph::{
        BuildMessagesNode, CallModelNode, ExecutionGraph, GraphFailure, GraphNode, GraphResult,
        GraphState, TracegenGraph, compile_graph,
    };
    pub use crate::harness::{BatchOutcome, TracegenHarness, run_tracegen};
    pub use crate::injection::{
        BASELINE_VARIANT, FailureMode, Injection, InjectionEngine, InjectionTransform,
        TransformRef,
    };
    pub use crate::model::{Message, MessageRole, ModelClient, ModelInfo, OpenAiClient, ScriptedModel};
    pub use crate::scenario::{Scenario, ScenarioFilter, ScenarioRegistry};
    pub use crate::trace::{StepRecord, TraceState, TraceStatus};
}
