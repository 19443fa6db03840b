// src/pipeline/metrics.rs
//
// Counters for frames, attempts and outcomes. Cheap to clone and share
// with whatever reports them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_seen: Arc<AtomicU64>,
    pub frames_with_hand: Arc<AtomicU64>,
    pub attempts_started: Arc<AtomicU64>,
    pub attempts_refused: Arc<AtomicU64>,
    pub successes: Arc<AtomicU64>,
    pub no_match: Arc<AtomicU64>,
    pub wrong_sign: Arc<AtomicU64>,
    pub cancelled: Arc<AtomicU64>,
    pub last_score_percent: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_seen: Arc::new(AtomicU64::new(0)),
            frames_with_hand: Arc::new(AtomicU64::new(0)),
            attempts_started: Arc::new(AtomicU64::new(0)),
            attempts_refused: Arc::new(AtomicU64::new(0)),
            successes: Arc::new(AtomicU64::new(0)),
            no_match: Arc::new(AtomicU64::new(0)),
            wrong_sign: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicU64::new(0)),
            last_score_percent: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set(&self, gauge: &AtomicU64, value: u64) {
        gauge.store(value, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_seen.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let successes = self.successes.load(Ordering::Relaxed);
        let decided = successes
            + self.no_match.load(Ordering::Relaxed)
            + self.wrong_sign.load(Ordering::Relaxed);
        MetricsSummary {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            frames_with_hand: self.frames_with_hand.load(Ordering::Relaxed),
            attempts_started: self.attempts_started.load(Ordering::Relaxed),
            attempts_refused: self.attempts_refused.load(Ordering::Relaxed),
            successes,
            no_match: self.no_match.load(Ordering::Relaxed),
            wrong_sign: self.wrong_sign.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            success_rate: if decided > 0 {
                successes as f64 / decided as f64
            } else {
                0.0
            },
            last_score_percent: self.last_score_percent.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            frames_per_sec: self.fps(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_seen: u64,
    pub frames_with_hand: u64,
    pub attempts_started: u64,
    pub attempts_refused: u64,
    pub successes: u64,
    pub no_match: u64,
    pub wrong_sign: u64,
    pub cancelled: u64,
    pub success_rate: f64,
    pub last_score_percent: u64,
    pub elapsed_secs: f64,
    pub frames_per_sec: f64,
}
