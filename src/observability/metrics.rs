use prometheus::{Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Renewal metrics
    pub renewals: IntCounterVec,
    pub renewal_failures: IntCounterVec,
    pub renewal_duration: HistogramVec,
    pub renewal_waiters: IntCounter,

    // Token metrics
    pub token_requests: IntCounterVec,
    pub token_expiry_unix: IntGauge,
    pub invalidations: IntCounter,

    // Store metrics
    pub store_failures: IntCounterVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,

    // === Service resource metrics ===
    pub process_cpu_usage: Gauge,
    pub process_memory_usage: IntGauge,
    pub process_virtual_memory: IntGauge,
    pub process_start_time: IntGauge,
    pub process_uptime: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("slsession".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Renewal
            renewals: IntCounterVec::new(Opts::new("renewals_total", "Authentication round-trips by trigger"),&["trigger"],).unwrap(),
            renewal_failures: IntCounterVec::new(Opts::new("renewal_failures_total", "Failed renewals by reason"),&["reason"],).unwrap(),
            renewal_duration: HistogramVec::new(HistogramOpts::new("renewal_duration_seconds", "Authentication round-trip seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),&["outcome"],).unwrap(),
            renewal_waiters: IntCounter::new("renewal_waiters_total", "Callers that joined an in-flight renewal").unwrap(),

            // Token
            token_requests: IntCounterVec::new(Opts::new("token_requests_total", "get_token calls by result"),&["result"],).unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the cached token").unwrap(),
            invalidations: IntCounter::new("invalidations_total", "Explicit token invalidations").unwrap(),

            // Store
            store_failures: IntCounterVec::new(Opts::new("store_failures_total", "Token store failures"),&["operation"],).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),
            process_cpu_usage: Gauge::new("process_cpu_usage_percent", "CPU usage % of this process").unwrap(),
            process_memory_usage: IntGauge::new("process_memory_usage_bytes", "Resident memory used by this process").unwrap(),
            process_virtual_memory: IntGauge::new("process_virtual_memory_bytes", "Virtual memory used by this process").unwrap(),
            process_start_time: IntGauge::new("process_start_time_seconds", "Process start time (UNIX seconds)").unwrap(),
            process_uptime: IntGauge::new("process_uptime_seconds", "Process uptime seconds").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.renewals.clone())).unwrap();
        reg.register(Box::new(metrics.renewal_failures.clone())).unwrap();
        reg.register(Box::new(metrics.renewal_duration.clone())).unwrap();
        reg.register(Box::new(metrics.renewal_waiters.clone())).unwrap();
        reg.register(Box::new(metrics.token_requests.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.invalidations.clone())).unwrap();
        reg.register(Box::new(metrics.store_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        reg.register(Box::new(metrics.process_cpu_usage.clone())).unwrap();
        reg.register(Box::new(metrics.process_memory_usage.clone())).unwrap();
        reg.register(Box::new(metrics.process_virtual_memory.clone())).unwrap();
        reg.register(Box::new(metrics.process_start_time.clone())).unwrap();
        reg.register(Box::new(metrics.process_uptime.clone())).unwrap();

        metrics
    }
}
