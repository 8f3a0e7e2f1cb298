//! Metrics instrumentation for runtime observability.

use autodca::infra::contracts::Amount;
use std::time::Instant;

/// Count a completed sweep and record how much it moved.
pub fn record_execution(amount: Amount) {
    metrics::counter!("job_executions_total", 1);
    metrics::histogram!("swept_amount", amount as f64);
}

/// Count a rejected execution by reason.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("job_rejections_total", 1, "reason" => reason);
}

/// Count a denied session-key authorization by reason.
pub fn record_denial(reason: &'static str) {
    metrics::counter!("authorization_denials_total", 1, "reason" => reason);
}

/// Record lock wait duration.
pub fn record_lock_wait(duration_ms: f64) {
    metrics::histogram!("lock_wait_duration", duration_ms);
}

/// Record job execution duration, lock wait included.
pub fn record_execution_duration(duration_ms: f64) {
    metrics::histogram!("execution_duration", duration_ms);
}

/// Record end-to-end operation duration.
pub fn record_operation_duration(duration_ms: f64) {
    metrics::histogram!("operation_duration", duration_ms);
}

/// RAII timer for automatic metric recording.
pub struct MetricTimer {
    start: Instant,
    metric_name: &'static str,
}

impl MetricTimer {
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }
}

impl Drop for MetricTimer {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        match self.metric_name {
            "operation_duration" => record_operation_duration(duration_ms),
            "execution_duration" => record_execution_duration(duration_ms),
            "lock_wait_duration" => record_lock_wait(duration_ms),
            _ => {}
        }
    }
}
