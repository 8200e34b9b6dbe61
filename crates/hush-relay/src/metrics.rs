//! Metrics collection and export

use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};

/// Relay metrics
pub struct RelayMetrics {
    live_connections: Gauge,
    identities_assigned: Counter,
    frames_direct: Counter,
    frames_broadcast: Counter,
    frames_dropped: Counter,
    decode_failures: Counter,
    evictions: Counter,
    registry: Registry,
}

impl RelayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let live_connections = Gauge::with_opts(Opts::new(
            "hush_relay_live_connections",
            "Number of registered client connections",
        ))?;
        registry.register(Box::new(live_connections.clone()))?;

        let identities_assigned = Counter::with_opts(Opts::new(
            "hush_relay_identities_assigned_total",
            "Total number of client identities assigned",
        ))?;
        registry.register(Box::new(identities_assigned.clone()))?;

        let frames_direct = Counter::with_opts(Opts::new(
            "hush_relay_frames_direct_total",
            "Frames delivered to a single addressed client",
        ))?;
        registry.register(Box::new(frames_direct.clone()))?;

        let frames_broadcast = Counter::with_opts(Opts::new(
            "hush_relay_frames_broadcast_total",
            "Frames fanned out to every live client",
        ))?;
        registry.register(Box::new(frames_broadcast.clone()))?;

        let frames_dropped = Counter::with_opts(Opts::new(
            "hush_relay_frames_dropped_total",
            "Addressed frames whose target was not live",
        ))?;
        registry.register(Box::new(frames_dropped.clone()))?;

        let decode_failures = Counter::with_opts(Opts::new(
            "hush_relay_decode_failures_total",
            "Inbound frames that were not valid envelopes",
        ))?;
        registry.register(Box::new(decode_failures.clone()))?;

        let evictions = Counter::with_opts(Opts::new(
            "hush_relay_evictions_total",
            "Clients evicted because their mailbox was full",
        ))?;
        registry.register(Box::new(evictions.clone()))?;

        Ok(Self {
            live_connections,
            identities_assigned,
            frames_direct,
            frames_broadcast,
            frames_dropped,
            decode_failures,
            evictions,
            registry,
        })
    }

    pub fn record_registered(&self) {
        self.identities_assigned.inc();
        self.live_connections.inc();
    }

    pub fn record_removed(&self) {
        self.live_connections.dec();
    }

    pub fn record_direct(&self) {
        self.frames_direct.inc();
    }

    pub fn record_broadcast(&self) {
        self.frames_broadcast.inc();
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.inc();
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.inc();
    }

    pub fn record_eviction(&self) {
        self.evictions.inc();
    }

    pub fn live_connections(&self) -> f64 {
        self.live_connections.get()
    }

    pub fn evictions(&self) -> f64 {
        self.evictions.get()
    }

    pub fn frames_dropped(&self) -> f64 {
        self.frames_dropped.get()
    }

    /// Export Prometheus format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
