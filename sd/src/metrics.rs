//! Service metrics
//!
//! Cheap atomic counters bumped along the turn pipeline, exposed as a
//! serializable snapshot for the metrics endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the orchestration pipeline
#[derive(Debug, Default)]
pub struct Metrics {
    turns_total: AtomicU64,
    turns_failed: AtomicU64,
    tool_calls: AtomicU64,
    tool_failures: AtomicU64,
    llm_failures: AtomicU64,
    refine_iterations: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub turns_total: u64,
    pub turns_failed: u64,
    pub tool_calls: u64,
    pub tool_failures: u64,
    pub llm_failures: u64,
    pub refine_iterations: u64,
}

impl Metrics {
    pub fn record_turn(&self) {
        self.turns_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn_failure(&self) {
        self.turns_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self, success: bool) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.tool_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_llm_failure(&self) {
        self.llm_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refine_iterations(&self, iterations: u32) {
        self.refine_iterations.fetch_add(iterations as u64, Ordering::Relaxed);
    }

    /// Snapshot all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            turns_total: self.turns_total.load(Ordering::Relaxed),
            turns_failed: self.turns_failed.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            llm_failures: self.llm_failures.load(Ordering::Relaxed),
            refine_iterations: self.refine_iterations.load(Ordering::Relaxed),
        }
    }
}
