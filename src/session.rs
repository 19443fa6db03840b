// src/session.rs
//
// Replays a recorded camera session through the engine, letter by letter,
// the way the game loop drives it live:
//
//   start(letter) → countdown ticks → frames → decision
//     success → wait advance_delay_ms → next letter
//     failure → wait out the cool-down → retry the same letter
//
// Ticks are derived from the recording's own timestamps so a replay is
// deterministic regardless of how fast it runs.

use crate::decision::{Decision, MatchDecisionEngine};
use crate::labels::SignKey;
use crate::matching::{SamplerStatus, SequenceSampler, VectorCodec};
use crate::pipeline::EngineEvent;
use crate::store::ReferenceStore;
use crate::types::{AttemptConfig, Frame, Hand, HandObservation, Landmark, SamplingConfig};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedFrame {
    pub timestamp_ms: f64,
    /// Raw handedness from the pose capability ("Left" / "Right")
    #[serde(default)]
    pub handedness: Option<String>,
    #[serde(default)]
    pub landmarks: Option<Vec<[f32; 3]>>,
}

impl RecordedFrame {
    /// A frame without exactly 21 landmarks counts as "no hand this frame"
    pub fn observation(&self, default_hand: Hand) -> Option<HandObservation> {
        let points: Vec<Landmark> = self.landmarks.as_ref()?.iter().map(|p| Landmark::from(*p)).collect();
        let frame = Frame::from_landmarks(&points).ok()?;
        let hand = self
            .handedness
            .as_deref()
            .and_then(Hand::from_camera_label)
            .unwrap_or(default_hand);
        Some(HandObservation { hand, frame })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionRecording {
    pub hand: Hand,
    pub word: String,
    pub frames: Vec<RecordedFrame>,
}

impl SessionRecording {
    pub fn symbols(&self) -> Vec<String> {
        self.word
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_uppercase().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLine {
    pub session: String,
    pub symbol: String,
    pub attempt: u32,
    pub timestamp_ms: f64,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterOutcome {
    pub symbol: String,
    pub attempts: u32,
    pub spelled: bool,
    pub best_score_percent: u8,
    /// Set when the letter could not be attempted at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refused: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session: String,
    pub hand: Hand,
    pub word: String,
    pub completed: bool,
    pub letters: Vec<LetterOutcome>,
    #[serde(skip)]
    pub lines: Vec<DecisionLine>,
}

pub fn find_session_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Session directory {} does not exist", dir.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    info!("Found {} session files", files.len());
    Ok(files)
}

pub async fn load_session(path: &Path) -> Result<SessionRecording> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read session {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse session {}", path.display()))
}

pub fn replay(
    name: &str,
    recording: &SessionRecording,
    engine: &mut MatchDecisionEngine,
    store: &ReferenceStore,
    attempt: &AttemptConfig,
) -> Result<SessionReport> {
    let symbols = recording.symbols();
    let mut letters: Vec<LetterOutcome> = symbols
        .iter()
        .map(|s| LetterOutcome {
            symbol: s.clone(),
            attempts: 0,
            spelled: false,
            best_score_percent: 0,
            refused: None,
        })
        .collect();
    let mut lines = Vec::new();

    let mut current = 0usize;
    let mut next_tick_at: Option<f64> = None;
    let mut resume_at: Option<f64> = None;

    for recorded in &recording.frames {
        let ts = recorded.timestamp_ms;

        while let Some(at) = next_tick_at {
            if ts < at {
                break;
            }
            engine.tick();
            next_tick_at = Some(at + attempt.tick_interval_ms);
        }

        // Skip letters that can never be attempted
        while current < letters.len() && engine.is_idle() && resume_at.map_or(true, |r| ts >= r) {
            let key = SignKey::new(recording.hand, letters[current].symbol.clone());
            match engine.start(store, key) {
                Ok(()) => {
                    letters[current].attempts += 1;
                    next_tick_at = Some(ts + attempt.tick_interval_ms);
                    break;
                }
                Err(e) => {
                    warn!("Skipping letter {}: {}", letters[current].symbol, e);
                    letters[current].refused = Some(e.to_string());
                    current += 1;
                }
            }
        }
        if current >= letters.len() {
            break;
        }

        let observation = recorded.observation(recording.hand);
        if let Some(decision) = engine.on_frame(store, observation.as_ref(), ts)? {
            let letter = &mut letters[current];
            letter.best_score_percent = letter.best_score_percent.max(decision.score_percent);
            lines.push(DecisionLine {
                session: name.to_string(),
                symbol: letter.symbol.clone(),
                attempt: letter.attempts,
                timestamp_ms: ts,
                decision: decision.clone(),
            });
            let sampler = engine.sampler();
            debug!(
                "{} attempt {} sampled every {} frames (≈{:.1} fps, {} frames seen)",
                letter.symbol,
                letter.attempts,
                sampler.gap(),
                sampler.fps_estimate(),
                sampler.frames_seen()
            );
            if decision.is_success() {
                letter.spelled = true;
                current += 1;
                resume_at = Some(ts + attempt.advance_delay_ms);
                debug!("Advancing to letter {} at {:.0} ms", current, ts);
            }
        }
        log_events(name, engine);
    }

    // The recording may end mid-attempt; nothing partial is matched
    engine.cancel();
    log_events(name, engine);

    let completed = !letters.is_empty() && letters.iter().all(|l| l.spelled);
    info!(
        "Session {}: {}/{} letters spelled",
        name,
        letters.iter().filter(|l| l.spelled).count(),
        letters.len()
    );
    Ok(SessionReport {
        session: name.to_string(),
        hand: recording.hand,
        word: recording.word.clone(),
        completed,
        letters,
        lines,
    })
}

/// Drain what the engine published since the last call into the trace log
fn log_events(session: &str, engine: &mut MatchDecisionEngine) {
    for event in engine.drain_events() {
        match event {
            EngineEvent::StateChanged { from, to } => trace!("[{}] {:?} → {:?}", session, from, to),
            EngineEvent::CountdownTick { remaining } => trace!("[{}] countdown {}", session, remaining),
            EngineEvent::SampleProgress { collected, total } => {
                trace!("[{}] sampled {}/{}", session, collected, total)
            }
            EngineEvent::Scored { percent } => trace!("[{}] scored {}%", session, percent),
            EngineEvent::Decided { target, decision } => {
                trace!("[{}] {} decided: {:?}", session, target, decision.status)
            }
            EngineEvent::Cancelled { target } => {
                trace!("[{}] cancelled {}", session, target.map(|t| t.to_string()).unwrap_or_default())
            }
        }
    }
}

/// Sample a recording once, with no countdown, into a reference vector.
///
/// Used to add a numbered capture to the corpus from a recorded session.
pub fn capture_vector(recording: &SessionRecording, sampling: &SamplingConfig, codec: &VectorCodec) -> Result<Vec<f32>> {
    let mut sampler = SequenceSampler::new(sampling.clone());
    for recorded in &recording.frames {
        let observation = recorded.observation(recording.hand).filter(|o| o.hand == recording.hand);
        if sampler.push(observation.as_ref(), recorded.timestamp_ms) == SamplerStatus::Complete {
            break;
        }
    }
    let sequence = sampler.take_sequence();
    if sequence.detected_count() == 0 {
        bail!("Recording has no sampled frame with a hand");
    }
    codec.encode(&sequence)
}
