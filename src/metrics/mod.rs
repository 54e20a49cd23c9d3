//! Metrics collection for observability

use prometheus::{
    Counter, CounterVec, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry,
};
use std::sync::Arc;
use std::time::Duration;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Chat completion calls
    pub requests: CounterVec,
    pub request_duration: HistogramVec,

    // Image validation
    pub invalid_images: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = register_counter_vec_with_registry!(
            Opts::new("vision_query_requests_total", "Total chat completion requests"),
            &["model", "status"],
            registry
        )?;

        let request_duration = register_histogram_vec_with_registry!(
            "vision_query_request_duration_seconds",
            "Chat completion request duration in seconds",
            &["model"],
            registry
        )?;

        let invalid_images = register_counter_with_registry!(
            Opts::new("vision_query_invalid_images_total", "Images rejected by validation"),
            registry
        )?;

        Ok(Self {
            registry,
            requests,
            request_duration,
            invalid_images,
        })
    }

    /// Record a completed HTTP exchange; `status` is the HTTP code or `error`
    pub fn record_request(&self, model: &str, status: &str, elapsed: Duration) {
        self.requests.with_label_values(&[model, status]).inc();
        self.request_duration
            .with_label_values(&[model])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_invalid_image(&self) {
        self.invalid_images.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
