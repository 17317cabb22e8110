//! Execution graph contract and the default trace-generation graph
//!
//! The harness depends only on an `invoke`-shaped contract. The default
//! graph is the two-node pipeline recovered from the original harness:
//! build the scenario messages, then call the model once. Custom graphs can
//! add reasoning steps; the injection transform is applied by the harness to
//! the final model output only, so graphs stay injection-unaware unless a
//! scenario explicitly targets reasoning-level injection.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::injection::Injection;
use crate::model::{Message, ModelClient};
use crate::scenario::Scenario;
use crate::trace::StepRecord;

/// State threaded through graph execution
#[derive(Clone)]
pub struct GraphState {
    /// Model handle for nodes that call out
    pub model: Arc<dyn ModelClient>,

    /// Scenario driving this run
    pub scenario: Scenario,

    /// Injection descriptor, available to graphs that target reasoning steps
    pub injection: Injection,

    /// Conversation built up by the graph
    pub messages: Vec<Message>,

    /// Final model output, reachable by the harness
    pub raw_model_output: Option<String>,

    /// Recorded steps
    pub steps: Vec<StepRecord>,
}

impl GraphState {
    /// Create the initial state for a run
    pub fn new(model: Arc<dyn ModelClient>, scenario: Scenario, injection: Injection) -> Self {
        Self {
            model,
            scenario,
            injection,
            messages: Vec::new(),
            raw_model_output: None,
            steps: Vec::new(),
        }
    }
}

/// A failed graph invocation, carrying whatever state was accumulated
pub struct GraphFailure {
    /// What went wrong
    pub message: String,
    /// Partial state at the point of failure
    pub state: GraphState,
}

/// Result of a graph invocation
pub type GraphResult = std::result::Result<GraphState, GraphFailure>;

/// An opaque, pre-compiled execution graph
#[async_trait]
pub trait ExecutionGraph: Send + Sync {
    /// Drive the graph from the initial state to completion
    async fn invoke(&self, state: GraphState) -> GraphResult;
}

/// A single node in the default graph
#[async_trait]
pub trait GraphNode: Send + Sync {
    /// Node name, recorded in the trace steps
    fn name(&self) -> &str;

    /// Run the node, mutating the state
    async fn run(&self, state: &mut GraphState) -> Result<()>;
}

/// Builds the system and user messages from the scenario
pub struct BuildMessagesNode;

#[async_trait]
impl GraphNode for BuildMessagesNode {
    fn name(&self) -> &str {
        "build_messages"
    }

    async fn run(&self, state: &mut GraphState) -> Result<()> {
        let system = format!(
            "[TRACEGEN AGENT]\n\
             Purpose: generate trace data for eval runs.\n\
             Scenario: {} ({})\n\
             Expected behavior (eval reference): {}\n\
             Ground truth (eval reference): {}\n",
            state.scenario.name,
            state.scenario.id,
            state.scenario.expected_behavior,
            state.scenario.ground_truth,
        );

        state.messages = vec![Message::system(system), Message::user(&state.scenario.prompt)];
        Ok(())
    }
}

/// Calls the model with the accumulated conversation
pub struct CallModelNode;

#[async_trait]
impl GraphNode for CallModelNode {
    fn name(&self) -> &str {
        "call_model"
    }

    async fn run(&self, state: &mut GraphState) -> Result<()> {
        let output = state.model.generate(&state.messages).await?;
        state.raw_model_output = Some(output);
        Ok(())
    }
}

/// The default trace-generation graph: build messages, call model
pub struct TracegenGraph {
    nodes: Vec<Box<dyn GraphNode>>,
}

impl TracegenGraph {
    /// Build a graph from an explicit node sequence
    pub fn from_nodes(nodes: Vec<Box<dyn GraphNode>>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl ExecutionGraph for TracegenGraph {
    async fn invoke(&self, mut state: GraphState) -> GraphResult {
        for node in &self.nodes {
            let start = Instant::now();
            match node.run(&mut state).await {
                Ok(()) => {
                    state
                        .steps
                        .push(StepRecord::success(node.name(), start.elapsed().as_millis() as u64));
                }
                Err(e) => {
                    state
                        .steps
                        .push(StepRecord::failure(node.name(), start.elapsed().as_millis() as u64));
                    return Err(GraphFailure {
                        message: format!("node '{}' failed: {e}", node.name()),
                        state,
                    });
                }
            }
        }
        Ok(state)
    }
}

/// Compile the default graph
pub fn compile_graph() -> TracegenGraph {
    TracegenGraph::from_nodes(vec![Box::new(BuildMessagesNode), Box::new(CallModelNode)])
}
