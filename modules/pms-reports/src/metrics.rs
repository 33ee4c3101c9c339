use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Report generation metrics, rendered at `GET /metrics`
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // Counters
    pub reports_generated_total: IntCounterVec,

    // Histograms
    pub report_generation_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let reports_generated_total = IntCounterVec::new(
            Opts::new("reports_generated_total", "Total report generation attempts"),
            &["strategy", "outcome"], // outcome: success|degraded|error
        )
        .expect("metric");

        let report_generation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "report_generation_duration_seconds",
                "Report generation duration seconds",
            ),
            &["strategy"],
        )
        .expect("metric");

        registry
            .register(Box::new(reports_generated_total.clone()))
            .expect("register metric");
        registry
            .register(Box::new(report_generation_duration_seconds.clone()))
            .expect("register metric");

        Self {
            registry,
            reports_generated_total,
            report_generation_duration_seconds,
        }
    }

    pub fn render(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&mf, &mut buf).map_err(|e| e.to_string())?;
        String::from_utf8(buf).map_err(|e| e.to_string())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
