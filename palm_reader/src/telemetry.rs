use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    reading_counter: Counter<u64>,
    llm_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("palm_reader");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(generate_boundaries((10, 50, 100, 500, 2000)))
            .with_description("Duration of palm readings in milliseconds")
            .build();

        let reading_counter = meter
            .u64_counter("readings_total")
            .with_description("Palm readings by outcome")
            .build();

        let llm_duration = meter
            .u64_histogram("llm_duration_ms")
            .with_boundaries(generate_boundaries((100, 500, 1000, 3000, 10000)))
            .with_description("Duration of roast generation calls in milliseconds")
            .build();

        Ok(Metrics {
            request_counter,
            prediction_duration,
            reading_counter,
            llm_duration,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.prediction_duration.record(duration_ms, &attributes);
    }

    pub fn record_reading(&self, outcome: &'static str) {
        self.reading_counter
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn record_llm_duration(&self, duration_ms: u64) {
        self.llm_duration.record(duration_ms, &[]);
    }
}

/// Histogram buckets: fine steps for fast calls, coarse steps for the tail.
fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step = ((parts.1 - parts.0) / 4).max(1) as usize;
    let middle_step = ((parts.2 - parts.1) / 5).max(1) as usize;
    let end_step = ((parts.3 - parts.2) / 4).max(1) as usize;
    let tail_step = ((parts.4 - parts.3) / 3).max(1) as usize;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
