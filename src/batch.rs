//! Per-batch shared state: naming context, result sink and counters.
//!
//! One [`ConversionBatch`] is created per top-level `collect` call and shared
//! (behind an `Arc`) by every task of that call, nested container batches
//! included. The result vector is the only shared mutable collection; every
//! append goes through its mutex so concurrent converters never interleave.

use crate::config::NormalizeConfig;
use crate::naming::{make_unique_name, BatchTimestamp};
use crate::output::{BatchStats, CanonicalPdf, OrdinalPath};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};

/// How a single dispatched file ended, for the batch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passthrough,
    Converted,
    /// Container whose members were collected.
    Expanded,
    Dropped,
    Rejected,
    Failed,
    DepthExceeded,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    passthrough: AtomicUsize,
    converted: AtomicUsize,
    dropped: AtomicUsize,
    rejected: AtomicUsize,
    failed: AtomicUsize,
    depth_exceeded: AtomicUsize,
}

/// Shared context of one batch.
pub struct ConversionBatch {
    timestamp: BatchTimestamp,
    config: NormalizeConfig,
    results: Mutex<Vec<CanonicalPdf>>,
    counters: Counters,
    office_slots: Option<Semaphore>,
    started: Instant,
}

impl ConversionBatch {
    pub fn new(timestamp: BatchTimestamp, config: NormalizeConfig) -> Arc<Self> {
        // Public fields can skip `build()`; a zero cap must still admit one.
        let office_slots = config
            .office_concurrency
            .map(|n| Semaphore::new(n.max(1)));
        Arc::new(Self {
            timestamp,
            config,
            results: Mutex::new(Vec::new()),
            counters: Counters::default(),
            office_slots,
            started: Instant::now(),
        })
    }

    pub fn timestamp(&self) -> &BatchTimestamp {
        &self.timestamp
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Office converter permits, when concurrency is capped.
    pub fn office_slots(&self) -> Option<&Semaphore> {
        self.office_slots.as_ref()
    }

    /// Name and wrap PDF bytes produced for the file at `ordinal`.
    pub fn canonical(
        &self,
        stem: &str,
        source_name: Option<&str>,
        ordinal: &OrdinalPath,
        bytes: Vec<u8>,
    ) -> CanonicalPdf {
        CanonicalPdf {
            unique_name: make_unique_name(&self.timestamp, stem, ordinal),
            source_name: source_name.map(str::to_string),
            bytes,
        }
    }

    /// Append one result. Each call is a single, complete insertion.
    pub async fn push(&self, pdf: CanonicalPdf) {
        self.results.lock().await.push(pdf);
    }

    pub fn record_dispatch(&self) {
        self.counters.dispatched.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record(&self, outcome: Outcome) {
        let c = &self.counters;
        let counter = match outcome {
            Outcome::Passthrough => Some(&c.passthrough),
            Outcome::Converted => Some(&c.converted),
            Outcome::Expanded => None,
            Outcome::Dropped => Some(&c.dropped),
            Outcome::Rejected => Some(&c.rejected),
            Outcome::Failed => Some(&c.failed),
            Outcome::DepthExceeded => Some(&c.depth_exceeded),
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        c.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn stats(&self) -> BatchStats {
        let c = &self.counters;
        BatchStats {
            dispatched: c.dispatched.load(Ordering::SeqCst),
            completed: c.completed.load(Ordering::SeqCst),
            passthrough: c.passthrough.load(Ordering::SeqCst),
            converted: c.converted.load(Ordering::SeqCst),
            dropped: c.dropped.load(Ordering::SeqCst),
            rejected: c.rejected.load(Ordering::SeqCst),
            failed: c.failed.load(Ordering::SeqCst),
            depth_exceeded: c.depth_exceeded.load(Ordering::SeqCst),
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    /// Drain the accumulated results. Call once every task has finished.
    pub async fn take_results(&self) -> Vec<CanonicalPdf> {
        std::mem::take(&mut *self.results.lock().await)
    }
}
