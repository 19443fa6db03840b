// src/matching/codec.rs
//
// Sequence <-> flat vector.
//
// Layout: frame-major, then landmark, then (x, y, z):
//   [f0.l0.x, f0.l0.y, f0.l0.z, f0.l1.x, ..., f0.l20.z, f1.l0.x, ...]
// Length is always N * 21 * 3.

use super::normalizer::normalize_frame;
use super::sampler::{SampledFrame, Sequence};
use crate::types::{MatchingConfig, SamplingConfig, COMPONENTS, LANDMARK_COUNT};
use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy)]
pub struct VectorCodec {
    frames_per_sequence: usize,
    precision_digits: u32,
}

impl VectorCodec {
    pub fn new(frames_per_sequence: usize, precision_digits: u32) -> Self {
        Self {
            frames_per_sequence,
            precision_digits,
        }
    }

    pub fn from_config(sampling: &SamplingConfig, matching: &MatchingConfig) -> Self {
        Self::new(sampling.frames_per_sequence, matching.precision_digits)
    }

    pub fn dimensions(&self) -> usize {
        self.frames_per_sequence * LANDMARK_COUNT * COMPONENTS
    }

    /// Normalize every frame and flatten into one rounded vector
    pub fn encode(&self, sequence: &Sequence) -> Result<Vec<f32>> {
        if sequence.len() != self.frames_per_sequence {
            bail!(
                "sequence has {} frames, codec expects {}",
                sequence.len(),
                self.frames_per_sequence
            );
        }

        let mut vector = Vec::with_capacity(self.dimensions());
        for sample in sequence.frames() {
            let frame = match sample {
                SampledFrame::Detected(frame) => normalize_frame(frame),
                SampledFrame::Missed => sample.to_wire(),
            };
            for lm in &frame.landmarks {
                vector.push(self.round(lm.x));
                vector.push(self.round(lm.y));
                vector.push(self.round(lm.z));
            }
        }

        if vector.len() != self.dimensions() {
            bail!(
                "encoded vector has {} components, expected {}",
                vector.len(),
                self.dimensions()
            );
        }
        Ok(vector)
    }

    /// Reflect across the vertical midplane: negate x and z, keep y.
    pub fn mirror(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if vector.len() != self.dimensions() {
            bail!(
                "cannot mirror vector of length {}, expected {}",
                vector.len(),
                self.dimensions()
            );
        }
        Ok(vector
            .chunks_exact(COMPONENTS)
            .flat_map(|p| [self.round(-p[0]), p[1], self.round(-p[2])])
            .collect())
    }

    pub fn round(&self, value: f32) -> f32 {
        round_component(value, self.precision_digits)
    }

    pub fn round_all(&self, vector: &[f32]) -> Vec<f32> {
        vector.iter().map(|v| self.round(*v)).collect()
    }
}

/// Round to a fixed number of decimal digits. Done in f64 so that rounding
/// an already rounded value is a no-op.
pub fn round_component(value: f32, digits: u32) -> f32 {
    let scale = 10f64.powi(digits as i32);
    ((value as f64 * scale).round() / scale) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::sampler::finalize;
    use crate::types::{Frame, Landmark};

    fn hand_frame(seed: f32) -> Frame {
        let points: Vec<Landmark> = (0..LANDMARK_COUNT)
            .map(|i| {
                let t = i as f32;
                Landmark::new(0.4 + seed * 0.01 + t * 0.013, 0.6 - t * 0.017, -0.002 * t + seed * 0.001)
            })
            .collect();
        Frame::from_landmarks(&points).unwrap()
    }

    fn sequence(n: usize) -> Sequence {
        let frames = (0..n)
            .map(|i| SampledFrame::Detected(hand_frame(i as f32)))
            .collect();
        finalize(frames, n)
    }

    #[test]
    fn test_encode_length_and_wrist_origin() {
        let codec = VectorCodec::new(7, 6);
        let vector = codec.encode(&sequence(7)).unwrap();
        assert_eq!(vector.len(), 7 * 21 * 3);
        assert_eq!(codec.dimensions(), 441);

        // Every frame's wrist triple is zero after normalization
        for frame in vector.chunks_exact(LANDMARK_COUNT * COMPONENTS) {
            assert_eq!(&frame[..3], &[0.0f32; 3]);
        }
    }

    #[test]
    fn test_encode_missed_frames_are_zero() {
        let codec = VectorCodec::new(3, 6);
        let seq = finalize(vec![SampledFrame::Detected(hand_frame(1.0))], 3);
        let vector = codec.encode(&seq).unwrap();
        let stride = LANDMARK_COUNT * COMPONENTS;
        assert!(vector[..stride].iter().any(|v| *v != 0.0));
        assert!(vector[stride..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_encode_rejects_wrong_sequence_length() {
        let codec = VectorCodec::new(7, 6);
        let short = Sequence::from_raw(vec![SampledFrame::Missed; 5]);
        let err = codec.encode(&short).unwrap_err();
        assert!(err.to_string().contains("5 frames"), "got: {}", err);
    }

    #[test]
    fn test_encode_values_are_rounded() {
        let codec = VectorCodec::new(2, 6);
        let vector = codec.encode(&sequence(2)).unwrap();
        for v in vector {
            assert_eq!(v, round_component(v, 6));
        }
    }

    #[test]
    fn test_mirror_negates_x_and_z() {
        let codec = VectorCodec::new(1, 6);
        let vector: Vec<f32> = (0..63).map(|i| codec.round(i as f32 * 0.01 + 0.005)).collect();
        let mirrored = codec.mirror(&vector).unwrap();
        for (orig, m) in vector.chunks_exact(3).zip(mirrored.chunks_exact(3)) {
            assert_eq!(m[0], -orig[0]);
            assert_eq!(m[1], orig[1]);
            assert_eq!(m[2], -orig[2]);
        }
    }

    #[test]
    fn test_double_mirror_is_identity() {
        let codec = VectorCodec::new(7, 6);
        let vector = codec.encode(&sequence(7)).unwrap();
        let twice = codec.mirror(&codec.mirror(&vector).unwrap()).unwrap();
        assert_eq!(twice, vector);
    }

    #[test]
    fn test_mirror_rejects_wrong_length() {
        let codec = VectorCodec::new(7, 6);
        assert!(codec.mirror(&[0.1, 0.2, 0.3]).is_err());
    }
}
