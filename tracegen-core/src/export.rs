//! Trace export
//!
//! Exporters receive terminal traces and forward them to an observability
//! backend with the structured tag set (`failure:<mode>`, scenario id, judge
//! criteria). Export is best-effort: the harness logs exporter failures but
//! never lets them invalidate a completed run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Result, TracegenError};
use crate::trace::{TraceState, TraceStatus};

/// Receives finalized traces
#[async_trait]
pub trait TraceExporter: Send + Sync {
    /// Forward a terminal trace to the backend
    async fn export(&self, trace: &TraceState) -> Result<()>;
}

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceFormat {
    /// JSON format
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Compact summary
    Summary,
}

/// Render a trace in the given format
pub fn render(trace: &TraceState, format: TraceFormat) -> Result<String> {
    match format {
        TraceFormat::Json => Ok(serde_json::to_string(trace)?),
        TraceFormat::JsonPretty => Ok(serde_json::to_string_pretty(trace)?),
        TraceFormat::Summary => Ok(to_summary(trace)),
    }
}

/// Render a compact human-readable summary
pub fn to_summary(trace: &TraceState) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Trace: {}", trace.run_id));
    lines.push(format!("Scenario: {} ({})", trace.scenario.name, trace.scenario.id));
    lines.push(format!(
        "Injection: {} / {}",
        trace.injection.mode, trace.injection.variant
    ));
    lines.push(format!(
        "Status: {}",
        match trace.status {
            TraceStatus::Pending => "PENDING",
            TraceStatus::Running => "RUNNING",
            TraceStatus::Completed => "COMPLETED",
            TraceStatus::Failed => "FAILED",
        }
    ));

    if let Some(ref error) = trace.error {
        lines.push(format!("Error: {error}"));
    }

    lines.push(format!("Steps: {}", trace.steps.len()));

    if let Some(ref output) = trace.output {
        lines.push(String::new());
        lines.push("Output:".to_string());
        lines.push(output.clone());
    }

    lines.push(String::new());
    lines.push("Tags:".to_string());
    for tag in trace.tags() {
        lines.push(format!("  {tag}"));
    }

    lines.join("\n")
}

/// OpenTelemetry-compatible span
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtelSpan {
    /// Trace ID
    pub trace_id: String,
    /// Span ID
    pub span_id: String,
    /// Parent span ID
    pub parent_span_id: Option<String>,
    /// Operation name
    pub operation_name: String,
    /// Start time (Unix timestamp in microseconds)
    pub start_time_us: u64,
    /// Duration in microseconds
    pub duration_us: u64,
    /// Status
    pub status: SpanStatus,
    /// Attributes
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Span status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error,
    Unset,
}

/// Convert a terminal trace to OpenTelemetry spans: one root span for the
/// run plus a child span per graph step
pub fn to_otel_spans(trace: &TraceState) -> Vec<OtelSpan> {
    let mut spans = Vec::new();
    let trace_id = &trace.run_id;

    let root_span_id = format!("{trace_id}-root");
    let start_time = trace.started_at.timestamp_micros().max(0) as u64;
    let end_time = trace
        .completed_at
        .unwrap_or(trace.started_at)
        .timestamp_micros()
        .max(0) as u64;

    let mut root_attrs: HashMap<String, serde_json::Value> =
        trace.attributes().into_iter().collect();
    root_attrs.insert("session.id".to_string(), json!(trace.session_id));
    root_attrs.insert("user.id".to_string(), json!(trace.user_id));
    root_attrs.insert("tags".to_string(), json!(trace.tags()));
    root_attrs.insert("metadata".to_string(), trace.metadata());

    let succeeded = trace.status == TraceStatus::Completed;
    spans.push(OtelSpan {
        trace_id: trace_id.clone(),
        span_id: root_span_id.clone(),
        parent_span_id: None,
        operation_name: format!("tracegen.{}", trace.scenario.id),
        start_time_us: start_time,
        duration_us: end_time.saturating_sub(start_time),
        status: if succeeded { SpanStatus::Ok } else { SpanStatus::Error },
        attributes: root_attrs,
    });

    let mut offset = 0u64;
    for (i, step) in trace.steps.iter().enumerate() {
        let mut attrs = HashMap::new();
        attrs.insert("step.name".to_string(), json!(step.name));

        spans.push(OtelSpan {
            trace_id: trace_id.clone(),
            span_id: format!("{trace_id}-step-{i}"),
            parent_span_id: Some(root_span_id.clone()),
            operation_name: step.name.clone(),
            start_time_us: start_time + offset * 1000,
            duration_us: step.duration_ms * 1000,
            status: if step.success { SpanStatus::Ok } else { SpanStatus::Error },
            attributes: attrs,
        });

        offset += step.duration_ms;
    }

    spans
}

/// Appends one JSON trace per line to a file
pub struct JsonLinesExporter {
    path: PathBuf,
}

impl JsonLinesExporter {
    /// Create an exporter writing to the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TraceExporter for JsonLinesExporter {
    async fn export(&self, trace: &TraceState) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut line = serde_json::to_string(trace)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        // Dropping a tokio File does not wait for buffered writes to land
        file.flush().await?;
        Ok(())
    }
}

/// Posts spans to an OTLP-style collector endpoint
pub struct HttpExporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExporter {
    /// Create an exporter posting to the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TraceExporter for HttpExporter {
    async fn export(&self, trace: &TraceState) -> Result<()> {
        let spans = to_otel_spans(trace);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "spans": spans }))
            .send()
            .await
            .map_err(|e| TracegenError::Export(format!("Failed to post spans: {e}")))?;

        if !response.status().is_success() {
            return Err(TracegenError::Export(format!(
                "Collector returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
