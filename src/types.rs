// src/types.rs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Landmarks per tracked hand (wrist + 4 joints per finger)
pub const LANDMARK_COUNT: usize = 21;

/// Components per landmark (x, y, z)
pub const COMPONENTS: usize = 3;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub matching: MatchingConfig,
    pub attempt: AttemptConfig,
    pub corpus: CorpusConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Frames per sequence (N)
    pub frames_per_sequence: usize,
    /// Wall-clock span the N samples should cover
    pub target_duration_secs: f64,
    /// FPS assumed before any frame timing has been observed
    pub initial_fps: f64,
    /// Weight of the previous FPS estimate in the moving average
    pub fps_smoothing: f64,
    /// Stop recomputing the sampling gap after this many incoming frames
    pub max_recompute_frames: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            frames_per_sequence: 7,
            target_duration_secs: 3.0,
            initial_fps: 30.0,
            fps_smoothing: 0.9,
            max_recompute_frames: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum cosine similarity for an accepted match
    pub similarity_threshold: f32,
    /// Decimal digits kept on every stored/compared component
    pub precision_digits: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.70,
            precision_digits: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttemptConfig {
    pub countdown_ticks: u32,
    pub cooldown_ticks: u32,
    pub tick_interval_ms: f64,
    /// Delay before the caller moves on to the next symbol after a success
    pub advance_delay_ms: f64,
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            cooldown_ticks: 5,
            tick_interval_ms: 1000.0,
            advance_delay_ms: 1500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub dir: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: "corpus".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub input_dir: String,
    pub output_dir: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_dir: "sessions".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "fingerspell_match=info".to_string(),
        }
    }
}

// ============================================================================
// HAND POSE
// ============================================================================

/// One tracked joint in normalized image coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const ORIGIN: Landmark = Landmark {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_origin(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(p: [f32; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// Exactly 21 landmarks for one hand at one instant. Index 0 is the wrist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub landmarks: [Landmark; LANDMARK_COUNT],
}

impl Frame {
    pub fn zero() -> Self {
        Self {
            landmarks: [Landmark::ORIGIN; LANDMARK_COUNT],
        }
    }

    pub fn from_landmarks(points: &[Landmark]) -> Result<Self> {
        if points.len() != LANDMARK_COUNT {
            bail!(
                "hand pose has {} landmarks, expected {}",
                points.len(),
                LANDMARK_COUNT
            );
        }
        let mut landmarks = [Landmark::ORIGIN; LANDMARK_COUNT];
        landmarks.copy_from_slice(points);
        Ok(Self { landmarks })
    }

    pub fn wrist(&self) -> Landmark {
        self.landmarks[0]
    }

    /// All landmarks at the origin: the wire form of "no hand detected"
    pub fn is_zero(&self) -> bool {
        self.landmarks.iter().all(Landmark::is_origin)
    }
}

/// Hand side as used by the reference corpus (after mirror correction)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Hand {
    Right,
    Left,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Right => "RIGHT",
            Self::Left => "LEFT",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
        }
    }

    /// Parse a corpus hand token ("RIGHT" / "LEFT")
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "RIGHT" => Some(Self::Right),
            "LEFT" => Some(Self::Left),
            _ => None,
        }
    }

    /// The pose capability reports handedness as seen by the camera, while
    /// the display (and the corpus) is mirrored: raw "Left" is the right hand.
    pub fn from_camera_label(label: &str) -> Option<Self> {
        match label {
            "Left" => Some(Self::Right),
            "Right" => Some(Self::Left),
            _ => None,
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hand reported by the pose capability for a single camera frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandObservation {
    pub hand: Hand,
    pub frame: Frame,
}
