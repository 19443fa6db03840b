// src/matching/normalizer.rs

use crate::types::Frame;

/// Translate a pose so the wrist (landmark 0) sits at the origin.
///
/// An all-zero frame is the "no hand" sentinel and is passed through
/// untouched. Landmark count is enforced when the frame is built.
pub fn normalize_frame(frame: &Frame) -> Frame {
    if frame.is_zero() {
        return *frame;
    }
    let wrist = frame.wrist();
    let mut out = *frame;
    for lm in out.landmarks.iter_mut() {
        lm.x -= wrist.x;
        lm.y -= wrist.y;
        lm.z -= wrist.z;
    }
    out
}
