//! Trace collector abstraction.
//!
//! The generation handler records one timed span per step plus the mock
//! evaluation scores and flushes them to an external observability
//! service. The collector is strictly best-effort: every method is
//! infallible from the caller's perspective, and an unconfigured process
//! gets [`NoopCollector`].

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use songforge_core::types::Timestamp;
use tokio::sync::Mutex;

/// One timed span within a trace.
#[derive(Debug, Clone)]
pub struct Span {
    pub name: String,
    pub input: Value,
    pub output: Value,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// One named score attached to a trace.
#[derive(Debug, Clone)]
pub struct Score {
    pub name: String,
    pub value: f64,
    pub comment: Option<String>,
}

/// External tracing collaborator.
///
/// Implementations log and swallow their own failures; a broken collector
/// must never affect pipeline outcomes.
#[async_trait]
pub trait TraceCollector: Send + Sync {
    async fn create_trace(&self, trace_id: &str, metadata: Value);
    async fn create_span(&self, trace_id: &str, span: Span);
    async fn create_score(&self, trace_id: &str, score: Score);
    async fn flush(&self);
}

// ---------------------------------------------------------------------------
// Span recording
// ---------------------------------------------------------------------------

/// A step span that has been opened but not yet closed.
#[derive(Debug)]
pub struct OpenSpan {
    name: String,
    input: Value,
    start_time: Timestamp,
}

/// Collects spans during a handler run for a single flush at the end.
///
/// Spans are buffered locally so that a mid-run collector outage cannot
/// interleave with pipeline work; everything ships in one best-effort
/// flush after the run settles.
#[derive(Debug, Default)]
pub struct SpanRecorder {
    spans: Vec<Span>,
    last_step: Option<String>,
}

impl SpanRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a step span, stamping its start time.
    pub fn open(&mut self, name: &str, input: Value) -> OpenSpan {
        self.last_step = Some(name.to_string());
        OpenSpan {
            name: name.to_string(),
            input,
            start_time: Utc::now(),
        }
    }

    /// Close a span with its output snapshot.
    pub fn close(&mut self, span: OpenSpan, output: Value) {
        self.spans.push(Span {
            name: span.name,
            input: span.input,
            output,
            start_time: span.start_time,
            end_time: Utc::now(),
        });
    }

    /// Record an `error` span naming the step that was in flight.
    pub fn record_error(&mut self, error: &str) {
        let now = Utc::now();
        self.spans.push(Span {
            name: "error".to_string(),
            input: json!({ "step": self.last_step }),
            output: json!({ "error": error }),
            start_time: now,
            end_time: now,
        });
    }

    /// The most recently opened step, if any.
    pub fn last_step(&self) -> Option<&str> {
        self.last_step.as_deref()
    }

    /// Ship all recorded spans to the collector and flush it.
    pub async fn flush_to(&self, collector: &dyn TraceCollector, trace_id: &str) {
        for span in &self.spans {
            collector.create_span(trace_id, span.clone()).await;
        }
        collector.flush().await;
    }
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// Collector used when no trace endpoint is configured.
pub struct NoopCollector;

#[async_trait]
impl TraceCollector for NoopCollector {
    async fn create_trace(&self, _trace_id: &str, _metadata: Value) {}
    async fn create_span(&self, _trace_id: &str, _span: Span) {}
    async fn create_score(&self, _trace_id: &str, _score: Score) {}
    async fn flush(&self) {}
}

/// Buffers trace events and ships them as one JSON batch on flush.
pub struct HttpCollector {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    events: Mutex<Vec<Value>>,
}

impl HttpCollector {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            events: Mutex::new(Vec::new()),
        }
    }

    async fn push(&self, event: Value) {
        self.events.lock().await.push(event);
    }
}

#[async_trait]
impl TraceCollector for HttpCollector {
    async fn create_trace(&self, trace_id: &str, metadata: Value) {
        self.push(json!({
            "type": "trace",
            "id": trace_id,
            "metadata": metadata,
            "timestamp": Utc::now(),
        }))
        .await;
    }

    async fn create_span(&self, trace_id: &str, span: Span) {
        self.push(json!({
            "type": "span",
            "trace_id": trace_id,
            "name": span.name,
            "input": span.input,
            "output": span.output,
            "start_time": span.start_time,
            "end_time": span.end_time,
        }))
        .await;
    }

    async fn create_score(&self, trace_id: &str, score: Score) {
        self.push(json!({
            "type": "score",
            "trace_id": trace_id,
            "name": score.name,
            "value": score.value,
            "comment": score.comment,
        }))
        .await;
    }

    async fn flush(&self) {
        let batch: Vec<Value> = {
            let mut events = self.events.lock().await;
            std::mem::take(&mut *events)
        };
        if batch.is_empty() {
            return;
        }

        let mut request = self
            .client
            .post(format!("{}/api/ingestion", self.endpoint))
            .json(&json!({ "batch": batch }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    status = response.status().as_u16(),
                    "Trace collector rejected batch",
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to ship trace batch");
            }
        }
    }
}

/// In-memory collector for tests.
#[derive(Default)]
pub struct MemoryCollector {
    traces: Mutex<Vec<(String, Value)>>,
    spans: Mutex<Vec<(String, Span)>>,
    scores: Mutex<Vec<(String, Score)>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn traces(&self) -> Vec<(String, Value)> {
        self.traces.lock().await.clone()
    }

    pub async fn spans(&self) -> Vec<(String, Span)> {
        self.spans.lock().await.clone()
    }

    pub async fn scores(&self) -> Vec<(String, Score)> {
        self.scores.lock().await.clone()
    }
}

#[async_trait]
impl TraceCollector for MemoryCollector {
    async fn create_trace(&self, trace_id: &str, metadata: Value) {
        self.traces
            .lock()
            .await
            .push((trace_id.to_string(), metadata));
    }

    async fn create_span(&self, trace_id: &str, span: Span) {
        self.spans.lock().await.push((trace_id.to_string(), span));
    }

    async fn create_score(&self, trace_id: &str, score: Score) {
        self.scores.lock().await.push((trace_id.to_string(), score));
    }

    async fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_spans_in_step_order() {
        let mut recorder = SpanRecorder::new();
        let a = recorder.open("audio_check", json!({}));
        recorder.close(a, json!({"ok": true}));
        let b = recorder.open("compose_params", json!({}));
        recorder.close(b, json!({}));

        assert_eq!(recorder.spans.len(), 2);
        assert_eq!(recorder.spans[0].name, "audio_check");
        assert_eq!(recorder.spans[1].name, "compose_params");
        assert_eq!(recorder.last_step(), Some("compose_params"));
    }

    #[test]
    fn error_span_names_the_inflight_step() {
        let mut recorder = SpanRecorder::new();
        let span = recorder.open("music_generate", json!({}));
        recorder.close(span, json!({}));
        let _unfinished = recorder.open("ab_eval", json!({}));
        recorder.record_error("provider exploded");

        let error_span = recorder.spans.last().unwrap();
        assert_eq!(error_span.name, "error");
        assert_eq!(error_span.input["step"], "ab_eval");
        assert_eq!(error_span.output["error"], "provider exploded");
    }

    #[tokio::test]
    async fn flush_ships_every_span_to_the_collector() {
        let mut recorder = SpanRecorder::new();
        let span = recorder.open("audio_check", json!({"track_id": 1}));
        recorder.close(span, json!({}));
        recorder.record_error("boom");

        let collector = MemoryCollector::new();
        recorder.flush_to(&collector, "trace-1").await;

        let spans = collector.spans().await;
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|(id, _)| id == "trace-1"));
    }
}
