use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Event store appends (throughput, latency)
// - Optimistic concurrency conflicts
// - Storage failures
// - Notification log position
//
// Metrics live in their own Registry; callers decide how to expose it.
// ============================================================================

pub struct EventStoreMetrics {
    registry: Registry,

    // Append Metrics
    pub events_appended: IntCounterVec,
    pub append_duration: HistogramVec,

    // Failure Metrics
    pub concurrency_conflicts: IntCounterVec,
    pub storage_failures: IntCounterVec,

    // Read Metrics
    pub events_read: IntCounterVec,
    pub global_sequence: IntGauge,
}

impl EventStoreMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Total events appended to the store"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let append_duration = HistogramVec::new(
            HistogramOpts::new("event_append_duration_seconds", "Event store append duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        let concurrency_conflicts = IntCounterVec::new(
            Opts::new(
                "event_concurrency_conflicts_total",
                "Appends rejected by optimistic concurrency",
            ),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(concurrency_conflicts.clone()))?;

        let storage_failures = IntCounterVec::new(
            Opts::new("event_storage_failures_total", "Store operations failed by the backend"),
            &["operation"],
        )?;
        registry.register(Box::new(storage_failures.clone()))?;

        let events_read = IntCounterVec::new(
            Opts::new("events_read_total", "Events returned by store reads"),
            &["path"],
        )?;
        registry.register(Box::new(events_read.clone()))?;

        let global_sequence = IntGauge::new(
            "event_global_sequence",
            "Highest global sequence assigned by this process",
        )?;
        registry.register(Box::new(global_sequence.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            append_duration,
            concurrency_conflicts,
            storage_failures,
            events_read,
            global_sequence,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registered() {
        let metrics = EventStoreMetrics::new().unwrap();
        metrics.events_appended.with_label_values(&["Reservation"]).inc_by(3);
        metrics.storage_failures.with_label_values(&["append"]).inc();

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"events_appended_total{aggregate_type="Reservation"} 3"#));
        assert!(text.contains(r#"event_storage_failures_total{operation="append"} 1"#));
    }

    #[test]
    fn test_render_text_format() {
        let metrics = EventStoreMetrics::new().unwrap();
        metrics.global_sequence.set(42);

        let text = metrics.render().unwrap();
        assert!(text.contains("event_global_sequence 42"));
    }
}
