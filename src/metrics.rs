//! Metrics Module - Prometheus Instrumentation
//!
//! - Query counts by query name
//! - Failed queries by error kind
//! - Query latency histogram
//! - Text exposition via `gather_metrics`

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Latency buckets for query histograms (seconds)
const LATENCY_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0];

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Queries answered, successful or not
    /// Labels: query (difficulty, chain_tips, tx_out, ...)
    pub static ref QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("chainview_queries_total", "Total queries served by query name"),
        &["query"]
    ).unwrap();

    /// Labels: kind (not_found, out_of_range, inconsistent, input_too_large, invalid_parameter)
    pub static ref QUERY_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("chainview_query_errors_total", "Total failed queries by error kind"),
        &["kind"]
    ).unwrap();

    pub static ref QUERY_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("chainview_query_duration_seconds", "Query latency")
            .buckets(LATENCY_BUCKETS.to_vec()),
        &["query"]
    ).unwrap();

    /// Active chain height seen by the last session
    pub static ref CHAIN_TIP_HEIGHT: IntGauge = IntGauge::new(
        "chainview_chain_tip_height", "Active chain tip height"
    ).unwrap();

    pub static ref MEMPOOL_SIZE: IntGauge = IntGauge::new(
        "chainview_mempool_size", "Transactions in the mempool snapshot"
    ).unwrap();
}

static REGISTERED: OnceCell<()> = OnceCell::new();

/// Register all collectors with `REGISTRY`. Safe to call more than once.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    REGISTERED.get_or_try_init(|| -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(QUERIES_TOTAL.clone()))?;
        REGISTRY.register(Box::new(QUERY_ERRORS.clone()))?;
        REGISTRY.register(Box::new(QUERY_DURATION.clone()))?;
        REGISTRY.register(Box::new(CHAIN_TIP_HEIGHT.clone()))?;
        REGISTRY.register(Box::new(MEMPOOL_SIZE.clone()))?;
        Ok(())
    })?;
    Ok(())
}

/// Prometheus text exposition of everything registered
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Timer for measuring durations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn record_query(query: &str, duration_secs: f64) {
    QUERIES_TOTAL.with_label_values(&[query]).inc();
    QUERY_DURATION.with_label_values(&[query]).observe(duration_secs);
}

pub fn increment_query_errors(kind: &str) {
    QUERY_ERRORS.with_label_values(&[kind]).inc();
}

pub fn set_chain_tip_height(height: i64) {
    CHAIN_TIP_HEIGHT.set(height);
}

pub fn set_mempool_size(size: usize) {
    MEMPOOL_SIZE.set(size as i64);
}
