//! Where training scalars go.

use signet_common::ClassificationMetrics;
use tracing::info;

/// Receives named scalars at a training step.
pub trait MetricSink: Send {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize);

    /// Log every field of a classification report under `prefix`.
    fn log_classification(&mut self, prefix: &str, metrics: &ClassificationMetrics, step: usize) {
        let fields = [
            ("precision", metrics.precision as f64),
            ("recall", metrics.recall as f64),
            ("accuracy", metrics.accuracy as f64),
            ("f1", metrics.f1 as f64),
            ("false_positives", metrics.false_positives as f64),
            ("false_negatives", metrics.false_negatives as f64),
        ];
        for (name, value) in fields {
            self.log_scalar(&format!("{prefix}_{name}"), value, step);
        }
    }
}

/// Emits each scalar as a tracing event tagged with the model id.
#[derive(Debug, Clone)]
pub struct TracingSink {
    model_id: String,
}

impl TracingSink {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

impl MetricSink for TracingSink {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) {
        info!(model = %self.model_id, step, metric = name, value, "metric");
    }
}

/// Discards everything. Used when logging is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricSink for NoopSink {
    fn log_scalar(&mut self, _name: &str, _value: f64, _step: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<(String, f64, usize)>);

    impl MetricSink for Recorder {
        fn log_scalar(&mut self, name: &str, value: f64, step: usize) {
            self.0.push((name.to_string(), value, step));
        }
    }

    #[test]
    fn test_classification_fields_are_prefixed() {
        let metrics = ClassificationMetrics {
            true_positives: 3,
            false_positives: 1,
            false_negatives: 2,
            true_negatives: 10,
            precision: 0.75,
            recall: 0.6,
            accuracy: 0.8125,
            f1: 0.6667,
        };
        let mut sink = Recorder::default();
        sink.log_classification("val", &metrics, 7);

        let names: Vec<&str> = sink.0.iter().map(|(n, _, _)| n.as_str()).collect();
        assert!(names.contains(&"val_precision"));
        assert!(names.contains(&"val_false_negatives"));
        assert!(sink.0.iter().all(|(_, _, step)| *step == 7));
    }
}
