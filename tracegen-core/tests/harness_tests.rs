//! End-to-end harness tests: scenario + injection + graph + model wired
//! together the way a batch driver would use them.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracegen_core::prelude::*;

fn registry() -> ScenarioRegistry {
    ScenarioRegistry::builtin()
}

/// A node that always raises after the model call succeeded
struct FaultyPostprocessNode;

#[async_trait]
impl GraphNode for FaultyPostprocessNode {
    fn name(&self) -> &str {
        "postprocess"
    }

    async fn run(&self, _state: &mut GraphState) -> Result<()> {
        Err(TracegenError::Graph("malformed graph state".to_string()))
    }
}

/// An exporter that always fails, for best-effort checks
struct BrokenExporter {
    attempts: AtomicUsize,
}

#[async_trait]
impl TraceExporter for BrokenExporter {
    async fn export(&self, _trace: &TraceState) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TracegenError::Export("collector unreachable".to_string()))
    }
}

#[tokio::test]
async fn baseline_run_is_identity() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();

    for scenario in registry().list() {
        let model = Arc::new(ScriptedModel::fixed("a clean, correct response"));
        let trace = harness
            .run(
                &graph,
                model,
                scenario,
                Injection::new(FailureMode::None),
                "demo_user",
            )
            .await
            .unwrap();

        assert_eq!(trace.status, TraceStatus::Completed);
        assert_eq!(trace.raw_output, trace.output);
        assert_eq!(trace.failure_label, "none");
    }
}

#[tokio::test]
async fn confidently_wrong_hides_ground_truth() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("math_multiplication").unwrap();

    let model = Arc::new(ScriptedModel::fixed(
        "27 × 19 = 513, so the final answer is 513.",
    ));
    let trace = harness
        .run(
            &graph,
            model,
            scenario,
            Injection::new(FailureMode::ConfidentlyWrong),
            "demo_user",
        )
        .await
        .unwrap();

    let output = trace.output.unwrap();
    assert!(!output.contains("513"), "ground truth leaked: {output}");
    // The clean response is retained for audit
    assert!(trace.raw_output.unwrap().contains("513"));
    assert_eq!(trace.failure_label, "confidently_wrong");
}

#[tokio::test]
async fn hallucination_contradicts_ground_truth() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("mars_landing").unwrap();

    let model = Arc::new(ScriptedModel::fixed(
        "No human has landed on Mars. Several robotic rovers have.",
    ));
    let trace = harness
        .run(
            &graph,
            model,
            scenario,
            Injection::new(FailureMode::Hallucination),
            "demo_user",
        )
        .await
        .unwrap();

    let output = trace.output.unwrap();
    assert!(output.contains("a human has landed on Mars"));
    assert!(!output.contains("No human has landed on Mars"));
}

#[tokio::test]
async fn format_violation_breaks_required_schema() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("structured_answer").unwrap();

    let model = Arc::new(ScriptedModel::fixed(
        r#"{"answer": "Paris", "confidence": 0.98}"#,
    ));
    let trace = harness
        .run(
            &graph,
            model,
            scenario,
            Injection::new(FailureMode::FormatViolation),
            "demo_user",
        )
        .await
        .unwrap();

    let output = trace.output.unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&output).is_err());
}

#[tokio::test]
async fn unknown_injection_fails_before_model_call() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("mars_landing").unwrap();

    let model = Arc::new(ScriptedModel::fixed("unused"));
    let err = harness
        .run(
            &graph,
            Arc::clone(&model) as Arc<dyn ModelClient>,
            scenario,
            Injection::new(FailureMode::Rude).with_variant("not_a_variant"),
            "demo_user",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TracegenError::UnknownInjection { .. }));
    assert_eq!(model.call_count(), 0, "no model round-trip may be spent");
}

#[tokio::test]
async fn empty_user_id_rejected() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("mars_landing").unwrap();

    let err = harness
        .run(
            &graph,
            Arc::new(ScriptedModel::fixed("unused")),
            scenario,
            Injection::default(),
            "  ",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TracegenError::InvalidUserId));
}

#[tokio::test]
async fn concurrent_runs_are_isolated() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("support_tone").unwrap();

    let model = Arc::new(ScriptedModel::fixed(
        "I'm sorry about that. Please use the returns page.",
    ));

    let (clean, rude) = tokio::join!(
        harness.run(
            &graph,
            Arc::clone(&model) as Arc<dyn ModelClient>,
            scenario,
            Injection::new(FailureMode::None),
            "user_a",
        ),
        harness.run(
            &graph,
            Arc::clone(&model) as Arc<dyn ModelClient>,
            scenario,
            Injection::new(FailureMode::Rude),
            "user_b",
        ),
    );

    let clean = clean.unwrap();
    let rude = rude.unwrap();

    assert_ne!(clean.run_id, rude.run_id);
    assert_eq!(clean.user_id, "user_a");
    assert_eq!(rude.user_id, "user_b");
    assert_eq!(clean.failure_label, "none");
    assert_eq!(rude.failure_label, "rude");
    // No cross-contamination: the clean trace keeps the polite output
    assert!(clean.output.as_deref().unwrap().contains("I'm sorry"));
    assert!(!rude.output.as_deref().unwrap().to_lowercase().contains("sorry"));
}

#[tokio::test]
async fn downstream_failure_preserves_raw_output() {
    let harness = TracegenHarness::new();
    let graph = TracegenGraph::from_nodes(vec![
        Box::new(BuildMessagesNode),
        Box::new(CallModelNode),
        Box::new(FaultyPostprocessNode),
    ]);
    let registry = registry();
    let scenario = registry.get("mars_landing").unwrap();

    let err = harness
        .run(
            &graph,
            Arc::new(ScriptedModel::fixed("model got this far")),
            scenario,
            Injection::new(FailureMode::Rude),
            "demo_user",
        )
        .await
        .unwrap_err();

    let TracegenError::Run(failure) = err else {
        panic!("expected a RunFailure");
    };
    assert_eq!(failure.trace.status, TraceStatus::Failed);
    assert_eq!(failure.trace.raw_output.as_deref(), Some("model got this far"));
    // The corrupted output was never produced
    assert!(failure.trace.output.is_none());
    assert!(failure.message.contains("postprocess"));
}

#[tokio::test]
async fn model_failure_yields_run_failure() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("mars_landing").unwrap();

    let err = harness
        .run(
            &graph,
            Arc::new(ScriptedModel::failing("connection timed out")),
            scenario,
            Injection::default(),
            "demo_user",
        )
        .await
        .unwrap_err();

    let TracegenError::Run(failure) = err else {
        panic!("expected a RunFailure");
    };
    assert_eq!(failure.trace.status, TraceStatus::Failed);
    assert!(failure.trace.raw_output.is_none());
    assert!(failure.trace.error.as_deref().unwrap().contains("connection timed out"));
}

#[tokio::test]
async fn export_failure_does_not_fail_the_run() {
    let exporter = Arc::new(BrokenExporter {
        attempts: AtomicUsize::new(0),
    });
    let harness = TracegenHarness::new().with_exporter(Arc::clone(&exporter) as Arc<dyn TraceExporter>);
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("mars_landing").unwrap();

    let trace = harness
        .run(
            &graph,
            Arc::new(ScriptedModel::fixed("fine")),
            scenario,
            Injection::default(),
            "demo_user",
        )
        .await
        .unwrap();

    assert_eq!(trace.status, TraceStatus::Completed);
    assert_eq!(exporter.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exported_jsonl_carries_failure_tags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.jsonl");
    let harness =
        TracegenHarness::new().with_exporter(Arc::new(JsonLinesExporter::new(&path)));
    let graph = compile_graph();
    let registry = registry();
    let scenario = registry.get("mars_landing").unwrap();

    harness
        .run(
            &graph,
            Arc::new(ScriptedModel::fixed("No human has landed on Mars.")),
            scenario,
            Injection::new(FailureMode::Hallucination),
            "demo_user",
        )
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let exported: TraceState = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert!(exported.tags().contains(&"failure:hallucination".to_string()));
    assert_eq!(exported.scenario.id, "mars_landing");
}

#[tokio::test]
async fn batch_continues_past_run_failures() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();

    let model = Arc::new(ScriptedModel::fixed("steady reply"));
    let pairs = vec![
        ("mars_landing".to_string(), Injection::default()),
        ("math_multiplication".to_string(), Injection::new(FailureMode::ConfidentlyWrong)),
    ];

    let outcome = harness
        .run_batch(&graph, model, &registry, &pairs, 2, "demo_user")
        .await
        .unwrap();
    assert_eq!(outcome.total(), 4);
    assert_eq!(outcome.completed.len(), 4);

    let failing = Arc::new(ScriptedModel::failing("down"));
    let outcome = harness
        .run_batch(&graph, failing, &registry, &pairs, 1, "demo_user")
        .await
        .unwrap();
    assert_eq!(outcome.completed.len(), 0);
    assert_eq!(outcome.failed.len(), 2);
}

#[tokio::test]
async fn batch_validates_matrix_up_front() {
    let harness = TracegenHarness::new();
    let graph = compile_graph();
    let registry = registry();

    let model = Arc::new(ScriptedModel::fixed("unused"));
    let pairs = vec![
        ("mars_landing".to_string(), Injection::default()),
        ("no_such_scenario".to_string(), Injection::default()),
    ];

    let err = harness
        .run_batch(
            &graph,
            Arc::clone(&model) as Arc<dyn ModelClient>,
            &registry,
            &pairs,
            1,
            "demo_user",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TracegenError::ScenarioNotFound(_)));
    assert_eq!(model.call_count(), 0);
}
