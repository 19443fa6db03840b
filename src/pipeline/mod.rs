// src/pipeline/mod.rs

pub mod event_bus;
pub mod metrics;

pub use event_bus::{EngineEvent, EventBus};
pub use metrics::{MetricsSummary, PipelineMetrics};
