// src/matching/sampler.rs
//
// Adaptive sequence sampler.
//
// One call per camera frame. The sampler keeps an exponential moving
// average of the observed frame rate and derives a sampling gap G so that
// N samples span roughly target_duration_secs on any device:
//
//   G = max(1, round(fps * target_duration_secs / N))
//
// A frame is a sample point when (frames_seen % G == 0). Sample points
// without a detected hand are recorded as Missed, so the sequence keeps
// its timing even when the hand drops out.

use crate::types::{Frame, HandObservation, SamplingConfig};
use tracing::debug;

/// One slot of a sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampledFrame {
    Detected(Frame),
    Missed,
}

impl SampledFrame {
    /// Wire representation: a missed sample becomes the all-zero frame
    pub fn to_wire(&self) -> Frame {
        match self {
            Self::Detected(frame) => *frame,
            Self::Missed => Frame::zero(),
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

/// Exactly N sampled frames, built only through [`finalize`]
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    frames: Vec<SampledFrame>,
}

impl Sequence {
    pub fn frames(&self) -> &[SampledFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn detected_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_detected()).count()
    }

    /// Bypass the length guarantee. Only for exercising codec error paths.
    #[cfg(test)]
    pub(crate) fn from_raw(frames: Vec<SampledFrame>) -> Self {
        Self { frames }
    }
}

/// Truncate to the first N frames, or right-pad with missed frames up to N.
pub fn finalize(mut buffer: Vec<SampledFrame>, frames_per_sequence: usize) -> Sequence {
    buffer.truncate(frames_per_sequence);
    buffer.resize(frames_per_sequence, SampledFrame::Missed);
    Sequence { frames: buffer }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerStatus {
    Collecting { collected: usize },
    Complete,
}

pub struct SequenceSampler {
    config: SamplingConfig,
    buffer: Vec<SampledFrame>,
    fps_estimate: f64,
    gap: u64,
    frames_seen: u64,
    last_frame_ms: Option<f64>,
}

impl SequenceSampler {
    pub fn new(config: SamplingConfig) -> Self {
        let fps_estimate = config.initial_fps;
        let gap = derive_gap(fps_estimate, &config);
        Self {
            buffer: Vec::with_capacity(config.frames_per_sequence),
            config,
            fps_estimate,
            gap,
            frames_seen: 0,
            last_frame_ms: None,
        }
    }

    /// Feed one camera frame.
    ///
    /// # Arguments
    /// * `observation` - The hand reported this frame, if any
    /// * `timestamp_ms` - Capture time of this frame
    pub fn push(&mut self, observation: Option<&HandObservation>, timestamp_ms: f64) -> SamplerStatus {
        if let Some(last) = self.last_frame_ms {
            let elapsed_ms = timestamp_ms - last;
            if elapsed_ms > 0.0 {
                let instant_fps = 1000.0 / elapsed_ms;
                let w = self.config.fps_smoothing;
                self.fps_estimate = w * self.fps_estimate + (1.0 - w) * instant_fps;
            }
        }
        self.last_frame_ms = Some(timestamp_ms);

        if self.frames_seen < self.config.max_recompute_frames {
            self.gap = derive_gap(self.fps_estimate, &self.config);
        }

        self.frames_seen += 1;

        if self.frames_seen % self.gap == 0 && !self.is_complete() {
            let sample = match observation {
                Some(obs) => SampledFrame::Detected(obs.frame),
                None => SampledFrame::Missed,
            };
            self.buffer.push(sample);
            debug!(
                "Sample {}/{} at frame {} (gap={}, fps≈{:.1}, hand={})",
                self.buffer.len(),
                self.config.frames_per_sequence,
                self.frames_seen,
                self.gap,
                self.fps_estimate,
                sample.is_detected()
            );
        }

        if self.is_complete() {
            SamplerStatus::Complete
        } else {
            SamplerStatus::Collecting {
                collected: self.buffer.len(),
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.buffer.len() >= self.config.frames_per_sequence
    }

    /// Close the capture window and produce an N-frame sequence
    pub fn take_sequence(&mut self) -> Sequence {
        let buffer = std::mem::take(&mut self.buffer);
        finalize(buffer, self.config.frames_per_sequence)
    }

    pub fn collected(&self) -> usize {
        self.buffer.len()
    }

    pub fn gap(&self) -> u64 {
        self.gap
    }

    pub fn fps_estimate(&self) -> f64 {
        self.fps_estimate
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn frames_per_sequence(&self) -> usize {
        self.config.frames_per_sequence
    }

    /// Discard the buffer and timing state for a new capture attempt
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fps_estimate = self.config.initial_fps;
        self.gap = derive_gap(self.fps_estimate, &self.config);
        self.frames_seen = 0;
        self.last_frame_ms = None;
    }
}

fn derive_gap(fps: f64, config: &SamplingConfig) -> u64 {
    let raw = (fps * config.target_duration_secs / config.frames_per_sequence as f64).round();
    if raw.is_finite() && raw >= 1.0 {
        raw as u64
    } else {
        1
    }
}
