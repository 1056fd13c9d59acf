//! Telemetry for auditrag
//!
//! Two parts: `init_logging` installs the tracing subscriber, and
//! `TelemetryCollector` records typed pipeline events for one process so
//! the CLI can summarise a run.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::rag::controller::LoopState;
use crate::types::SourceKind;

/// Install the global tracing subscriber
///
/// Priority: `RUST_LOG` > `level`. Logs go to stderr so JSON answers on
/// stdout stay machine-readable. Repeated calls are no-ops.
pub fn init_logging(level: &str, json: bool) {
    let default_filter = format!("warn,auditrag={}", level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    RunStarted {
        query: String,
        timestamp: Instant,
    },
    RoundStarted {
        round: u32,
        timestamp: Instant,
    },
    SourceCompleted {
        source: SourceKind,
        documents: usize,
        timestamp: Instant,
    },
    SourceFailed {
        source: SourceKind,
        error: String,
        timestamp: Instant,
    },
    DocumentsValidated {
        round: u32,
        judged: usize,
        accepted: usize,
        timestamp: Instant,
    },
    LoopTransition {
        to: LoopState,
        retry_count: u32,
        timestamp: Instant,
    },
    AnswerGenerated {
        chars: usize,
        duration_ms: u64,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub runs: usize,
    pub rounds: usize,
    pub source_calls: usize,
    pub source_failures: usize,
    pub documents_retrieved: usize,
    pub documents_judged: usize,
    pub documents_accepted: usize,
    pub retries: usize,
    pub answers: usize,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

/// Lock, recovering the guard from a poisoned mutex
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::RunStarted { .. } => stats.runs += 1,
                TelemetryEvent::RoundStarted { .. } => stats.rounds += 1,
                TelemetryEvent::SourceCompleted { documents, .. } => {
                    stats.source_calls += 1;
                    stats.documents_retrieved += documents;
                }
                TelemetryEvent::SourceFailed { .. } => {
                    stats.source_calls += 1;
                    stats.source_failures += 1;
                }
                TelemetryEvent::DocumentsValidated { judged, accepted, .. } => {
                    stats.documents_judged += judged;
                    stats.documents_accepted += accepted;
                }
                TelemetryEvent::LoopTransition { to, .. } => {
                    if *to == LoopState::Collecting {
                        stats.retries += 1;
                    }
                }
                TelemetryEvent::AnswerGenerated { .. } => stats.answers += 1,
            }
        }

        lock(&self.events).push(event);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Share of source calls that returned without error
    pub fn source_success_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        if stats.source_calls == 0 {
            1.0
        } else {
            (stats.source_calls - stats.source_failures) as f64 / stats.source_calls as f64
        }
    }

    /// Share of judged documents that were accepted
    pub fn acceptance_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        if stats.documents_judged == 0 {
            0.0
        } else {
            stats.documents_accepted as f64 / stats.documents_judged as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
