//! Prometheus Metrics Registry - Persistence Observability
//!
//! Counts writes per route, fallback activations, validation failures,
//! and unabsorbed remote errors. All metrics follow the naming
//! convention `fintrack_*` and carry the entity kind as a label.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Centralized Prometheus metrics for the persistence facade.
pub struct StoreMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Successful writes, by kind and route (remote/fallback).
    pub writes: IntCounterVec,
    /// Permission denials absorbed by the local fallback, by kind and operation.
    pub fallbacks: IntCounterVec,
    /// Drafts rejected before I/O, by kind and field.
    pub validation_failures: IntCounterVec,
    /// Remote errors propagated to the caller, by kind and operation.
    pub remote_errors: IntCounterVec,
}

impl StoreMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let writes = IntCounterVec::new(
            Opts::new("fintrack_writes_total", "Records written, by route"),
            &["kind", "route"],
        )?;

        let fallbacks = IntCounterVec::new(
            Opts::new(
                "fintrack_fallback_total",
                "Operations served by the local fallback after a permission denial",
            ),
            &["kind", "op"],
        )?;

        let validation_failures = IntCounterVec::new(
            Opts::new(
                "fintrack_validation_failures_total",
                "Drafts rejected before any store was touched",
            ),
            &["kind", "field"],
        )?;

        let remote_errors = IntCounterVec::new(
            Opts::new(
                "fintrack_remote_errors_total",
                "Remote store errors propagated to the caller",
            ),
            &["kind", "op"],
        )?;

        // Register all metrics
        registry.register(Box::new(writes.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;
        registry.register(Box::new(validation_failures.clone()))?;
        registry.register(Box::new(remote_errors.clone()))?;

        Ok(Self {
            registry,
            writes,
            fallbacks,
            validation_failures,
            remote_errors,
        })
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
