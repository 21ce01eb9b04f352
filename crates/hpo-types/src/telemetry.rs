//! Telemetry events emitted at well-defined executor points. The default sink forwards to `tracing`; an external
//! dashboard can implement `TelemetrySink` itself to subscribe programmatically.

use crate::trial::{StudyId, TrialId};

/// Events emitted at well-defined points in a trial's lifecycle.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    TrialStarted {
        study_id: StudyId,
        trial_id: TrialId,
    },
    TrialReported {
        study_id: StudyId,
        trial_id: TrialId,
        rung_index: u32,
        score: f64,
    },
    TrialPruned {
        study_id: StudyId,
        trial_id: TrialId,
    },
    TrialSucceeded {
        study_id: StudyId,
        trial_id: TrialId,
        score: f64,
    },
    TrialFailed {
        study_id: StudyId,
        trial_id: TrialId,
        kind: String,
    },
    StudyCompleted {
        study_id: StudyId,
    },
}

/// Subscriber for telemetry events. Implementations must not
/// block the executor loop for long; the default implementation logs via
/// `tracing` and returns immediately.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Default sink: forwards every event to `tracing` as a structured event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::TrialStarted { study_id, trial_id } => {
                tracing::info!(%study_id, %trial_id, "trial_started");
            }
            TelemetryEvent::TrialReported {
                study_id,
                trial_id,
                rung_index,
                score,
            } => {
                tracing::debug!(%study_id, %trial_id, rung_index, score, "trial_reported");
            }
            TelemetryEvent::TrialPruned { study_id, trial_id } => {
                tracing::info!(%study_id, %trial_id, "trial_pruned");
            }
            TelemetryEvent::TrialSucceeded {
                study_id,
                trial_id,
                score,
            } => {
                tracing::info!(%study_id, %trial_id, score, "trial_succeeded");
            }
            TelemetryEvent::TrialFailed {
                study_id,
                trial_id,
                kind,
            } => {
                tracing::warn!(%study_id, %trial_id, kind = %kind, "trial_failed");
            }
            TelemetryEvent::StudyCompleted { study_id } => {
                tracing::info!(%study_id, "study_completed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl TelemetrySink for RecordingSink {
        fn emit(&self, event: TelemetryEvent) {
            let label = match event {
                TelemetryEvent::TrialStarted { .. } => "started",
                TelemetryEvent::TrialReported { .. } => "reported",
                TelemetryEvent::TrialPruned { .. } => "pruned",
                TelemetryEvent::TrialSucceeded { .. } => "succeeded",
                TelemetryEvent::TrialFailed { .. } => "failed",
                TelemetryEvent::StudyCompleted { .. } => "completed",
            };
            self.events.lock().unwrap().push(label.to_string());
        }
    }

    #[test]
    fn custom_sink_receives_events() {
        let sink = Arc::new(RecordingSink::default());
        sink.emit(TelemetryEvent::TrialStarted {
            study_id: uuid::Uuid::new_v4(),
            trial_id: uuid::Uuid::new_v4(),
        });
        sink.emit(TelemetryEvent::StudyCompleted {
            study_id: uuid::Uuid::new_v4(),
        });
        let events = sink.events.lock().unwrap();
        assert_eq!(events.as_slice(), ["started", "completed"]);
    }

    #[test]
    fn tracing_sink_does_not_panic() {
        let sink = TracingTelemetrySink;
        sink.emit(TelemetryEvent::TrialSucceeded {
            study_id: uuid::Uuid::new_v4(),
            trial_id: uuid::Uuid::new_v4(),
            score: 1.0,
        });
    }
}
