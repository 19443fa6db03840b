// src/decision/engine.rs
//
// One attempt at signing a target symbol:
//
//   Idle ──start──▶ Countdown ──N ticks──▶ Sampling ──sequence full──▶ decide
//                                                                   │
//          success: back to Idle immediately ◀──────────────────────┤
//          failure: Decided (cool-down ticks) ──▶ Idle ◀────────────┘
//
// Driven by two inputs only: one on_frame() per camera frame and one
// tick() per timer tick. Both run to completion before the next call, so
// no state is shared across threads. cancel() returns to Idle from any
// attempt state and discards the buffer; pending countdown/cool-down
// ticks are dropped with the state that owned them.

use super::policy::{decide, Decision, DecisionStatus, FailureReason};
use crate::labels::SignKey;
use crate::matching::{SamplerStatus, SequenceSampler, VectorCodec};
use crate::pipeline::{EngineEvent, EventBus, PipelineMetrics};
use crate::store::ReferenceStore;
use crate::types::{Config, HandObservation};
use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

const MAX_PENDING_EVENTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnavailableReason {
    /// The hand-pose capability failed to initialize
    PoseCapabilityFailed,
    /// The reference corpus could not be loaded
    StoreLoadFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Idle,
    Countdown { target: SignKey, remaining: u32 },
    Sampling { target: SignKey },
    /// Failed attempt; no new attempt until the cool-down runs out
    Decided { decision: Decision, cooldown_remaining: u32 },
    Unavailable(UnavailableReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineStateKind {
    Idle,
    Countdown,
    Sampling,
    Decided,
    Unavailable,
}

impl EngineState {
    pub fn kind(&self) -> EngineStateKind {
        match self {
            Self::Idle => EngineStateKind::Idle,
            Self::Countdown { .. } => EngineStateKind::Countdown,
            Self::Sampling { .. } => EngineStateKind::Sampling,
            Self::Decided { .. } => EngineStateKind::Decided,
            Self::Unavailable(_) => EngineStateKind::Unavailable,
        }
    }

    pub fn target(&self) -> Option<&SignKey> {
        match self {
            Self::Countdown { target, .. } | Self::Sampling { target } => Some(target),
            _ => None,
        }
    }
}

pub struct MatchDecisionEngine {
    countdown_ticks: u32,
    cooldown_ticks: u32,
    threshold: f32,
    state: EngineState,
    sampler: SequenceSampler,
    codec: VectorCodec,
    events: EventBus,
    metrics: PipelineMetrics,
}

impl MatchDecisionEngine {
    pub fn new(config: &Config) -> Self {
        Self::with_metrics(config, PipelineMetrics::new())
    }

    pub fn with_metrics(config: &Config, metrics: PipelineMetrics) -> Self {
        Self {
            countdown_ticks: config.attempt.countdown_ticks,
            cooldown_ticks: config.attempt.cooldown_ticks,
            threshold: config.matching.similarity_threshold,
            state: EngineState::Idle,
            sampler: SequenceSampler::new(config.sampling.clone()),
            codec: VectorCodec::from_config(&config.sampling, &config.matching),
            events: EventBus::new(MAX_PENDING_EVENTS),
            metrics,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == EngineState::Idle
    }

    pub fn codec(&self) -> &VectorCodec {
        &self.codec
    }

    pub fn sampler(&self) -> &SequenceSampler {
        &self.sampler
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    fn transition(&mut self, next: EngineState) {
        let from = self.state.kind();
        let to = next.kind();
        self.state = next;
        if from != to {
            debug!("Engine {:?} → {:?}", from, to);
            self.events.publish(EngineEvent::StateChanged { from, to });
        }
    }

    /// Idle → Countdown. Refused unless the engine is idle and the store
    /// holds reference data for `target` in the codec's dimensionality.
    pub fn start(&mut self, store: &ReferenceStore, target: SignKey) -> Result<()> {
        match &self.state {
            EngineState::Idle => {}
            EngineState::Unavailable(reason) => {
                bail!("Cannot start {}: engine unavailable ({:?})", target, reason)
            }
            EngineState::Decided {
                cooldown_remaining, ..
            } => {
                self.metrics.inc(&self.metrics.attempts_refused);
                bail!(
                    "Cannot start {}: cooling down for {} more ticks",
                    target,
                    cooldown_remaining
                )
            }
            other => bail!("Cannot start {}: attempt already in {:?}", target, other.kind()),
        }

        if !store.has_entries(&target) {
            self.metrics.inc(&self.metrics.attempts_refused);
            warn!("No reference data for {}", target);
            bail!("No reference data for {}", target);
        }
        if store.dimensions() != Some(self.codec.dimensions()) {
            self.metrics.inc(&self.metrics.attempts_refused);
            bail!(
                "Reference vectors have {:?} components, engine encodes {}",
                store.dimensions(),
                self.codec.dimensions()
            );
        }

        info!("▶ Attempt started for {}", target);
        self.metrics.inc(&self.metrics.attempts_started);
        self.sampler.reset();
        if self.countdown_ticks == 0 {
            self.transition(EngineState::Sampling { target });
        } else {
            self.transition(EngineState::Countdown {
                target,
                remaining: self.countdown_ticks,
            });
        }
        Ok(())
    }

    /// Advance the countdown or cool-down by one timer tick
    pub fn tick(&mut self) {
        match &mut self.state {
            EngineState::Countdown { target, remaining } => {
                *remaining = remaining.saturating_sub(1);
                let left = *remaining;
                let target = target.clone();
                self.events.publish(EngineEvent::CountdownTick { remaining: left });
                if left == 0 {
                    self.sampler.reset();
                    self.transition(EngineState::Sampling { target });
                }
            }
            EngineState::Decided {
                cooldown_remaining, ..
            } => {
                *cooldown_remaining = cooldown_remaining.saturating_sub(1);
                if *cooldown_remaining == 0 {
                    self.transition(EngineState::Idle);
                }
            }
            _ => {}
        }
    }

    /// Feed one camera frame. Ignored unless sampling.
    ///
    /// `observation.hand` is the effective (already inverted) hand; a frame
    /// showing the other hand is sampled as missed.
    ///
    /// Returns the decision when this frame completed the sequence.
    pub fn on_frame(
        &mut self,
        store: &ReferenceStore,
        observation: Option<&HandObservation>,
        timestamp_ms: f64,
    ) -> Result<Option<Decision>> {
        self.metrics.inc(&self.metrics.frames_seen);
        if observation.is_some() {
            self.metrics.inc(&self.metrics.frames_with_hand);
        }

        let EngineState::Sampling { target } = &self.state else {
            return Ok(None);
        };
        let target = target.clone();

        // A hand other than the target's counts as no hand at this frame
        let observation = observation.filter(|o| o.hand == target.hand);
        let before = self.sampler.collected();
        let status = self.sampler.push(observation, timestamp_ms);
        if self.sampler.collected() != before {
            self.events.publish(EngineEvent::SampleProgress {
                collected: self.sampler.collected(),
                total: self.sampler.frames_per_sequence(),
            });
        }

        match status {
            SamplerStatus::Collecting { .. } => Ok(None),
            SamplerStatus::Complete => self.complete(store, target).map(Some),
        }
    }

    fn complete(&mut self, store: &ReferenceStore, target: SignKey) -> Result<Decision> {
        let sequence = self.sampler.take_sequence();
        let vector = match self.codec.encode(&sequence) {
            Ok(v) => v,
            Err(e) => {
                self.sampler.reset();
                self.transition(EngineState::Idle);
                return Err(e);
            }
        };
        debug!(
            "Sequence complete for {}: {}/{} frames with a hand",
            target,
            sequence.detected_count(),
            sequence.len()
        );

        let decision = self.evaluate(store, &target, &vector);
        self.record(target, decision.clone());
        Ok(decision)
    }

    /// Match a vector against the store and apply the accept/reject policy.
    pub fn evaluate(&self, store: &ReferenceStore, target: &SignKey, vector: &[f32]) -> Decision {
        let best = store.find_best_match_averaged(vector);
        if let Some(m) = &best {
            debug!("Best match {} at {:.3}", m.label, m.similarity);
        }
        if let Some(nearest) = store.find_best_match(vector) {
            debug!("Nearest single capture {} at {:.3}", nearest.label, nearest.similarity);
        }
        decide(target, best.as_ref(), self.threshold)
    }

    fn record(&mut self, target: SignKey, decision: Decision) {
        self.events.publish(EngineEvent::Scored {
            percent: decision.score_percent,
        });
        self.metrics
            .set(&self.metrics.last_score_percent, decision.score_percent as u64);

        match (decision.status, decision.reason) {
            (DecisionStatus::Success, _) => {
                info!("✓ {} signed correctly ({}%)", target, decision.score_percent);
                self.metrics.inc(&self.metrics.successes);
            }
            (_, Some(FailureReason::WrongSign)) => {
                info!(
                    "✗ {}: looks like {} ({}%)",
                    target,
                    decision.matched_symbol.as_deref().unwrap_or("?"),
                    decision.score_percent
                );
                self.metrics.inc(&self.metrics.wrong_sign);
            }
            _ => {
                info!("✗ {}: no match ({}%)", target, decision.score_percent);
                self.metrics.inc(&self.metrics.no_match);
            }
        }

        self.events.publish(EngineEvent::Decided {
            target,
            decision: decision.clone(),
        });

        if decision.is_success() || self.cooldown_ticks == 0 {
            self.transition(EngineState::Idle);
        } else {
            self.transition(EngineState::Decided {
                decision,
                cooldown_remaining: self.cooldown_ticks,
            });
        }
    }

    /// Abort the current attempt (or cool-down) and return to Idle
    pub fn cancel(&mut self) {
        let target = match &self.state {
            EngineState::Countdown { .. } | EngineState::Sampling { .. } => {
                self.metrics.inc(&self.metrics.cancelled);
                self.state.target().cloned()
            }
            EngineState::Decided { .. } => None,
            EngineState::Idle | EngineState::Unavailable(_) => return,
        };
        if let Some(t) = &target {
            info!("Attempt for {} cancelled", t);
        }
        self.sampler.reset();
        self.events.publish(EngineEvent::Cancelled { target });
        self.transition(EngineState::Idle);
    }

    /// An external capability failed; stays unavailable until [`recover`].
    ///
    /// [`recover`]: MatchDecisionEngine::recover
    pub fn mark_unavailable(&mut self, reason: UnavailableReason) {
        warn!("Engine unavailable: {:?}", reason);
        self.sampler.reset();
        self.transition(EngineState::Unavailable(reason));
    }

    pub fn recover(&mut self) {
        if let EngineState::Unavailable(reason) = &self.state {
            info!("Engine recovered from {:?}", reason);
            self.transition(EngineState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{finalize, SampledFrame};
    use crate::store::tests::record;
    use crate::types::{Frame, Hand, Landmark, LANDMARK_COUNT};

    /// Gap of 1 at 1 fps: every frame is a sample point
    fn test_config() -> Config {
        let mut config = Config::default();
        config.sampling.initial_fps = 1.0;
        config
    }

    /// A pose spread mostly along x, so its mirror image points away from it
    fn hand_frame() -> Frame {
        let points: Vec<Landmark> = (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(0.3 + i as f32 * 0.02, 0.5 + (i % 4) as f32 * 0.004, 0.001 * i as f32))
            .collect();
        Frame::from_landmarks(&points).unwrap()
    }

    fn observation(hand: Hand) -> HandObservation {
        HandObservation {
            hand,
            frame: hand_frame(),
        }
    }

    fn reference_vector(codec: &VectorCodec) -> Vec<f32> {
        let seq = finalize(vec![SampledFrame::Detected(hand_frame()); 7], 7);
        codec.encode(&seq).unwrap()
    }

    fn store_with(records: Vec<crate::store::ReferenceRecord>) -> ReferenceStore {
        let mut store = ReferenceStore::new();
        store.load(records);
        store
    }

    fn unit(codec: &VectorCodec, index: usize) -> Vec<f32> {
        let mut v = vec![0.0; codec.dimensions()];
        v[index] = 1.0;
        v
    }

    /// Start, run the countdown out and feed frames until a decision
    fn run_attempt(
        engine: &mut MatchDecisionEngine,
        store: &ReferenceStore,
        target: SignKey,
        obs: Option<HandObservation>,
    ) -> Decision {
        engine.start(store, target).unwrap();
        for _ in 0..3 {
            engine.tick();
        }
        assert_eq!(engine.state().kind(), EngineStateKind::Sampling);
        let mut t = 0.0;
        for _ in 0..100 {
            if let Some(d) = engine.on_frame(store, obs.as_ref(), t).unwrap() {
                return d;
            }
            t += 1000.0;
        }
        panic!("attempt never completed");
    }

    #[test]
    fn test_scenario_exact_match_succeeds() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);

        let d = run_attempt(&mut engine, &store, SignKey::new(Hand::Right, "A"), Some(observation(Hand::Right)));
        assert!(d.is_success(), "got {:?}", d);
        assert_eq!(d.score_percent, 100);
        assert!(engine.is_idle(), "success returns straight to Idle");
    }

    #[test]
    fn test_other_hand_frames_sample_as_missed() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);

        // Camera reports the left hand while RIGHT A is asked
        let d = run_attempt(&mut engine, &store, SignKey::new(Hand::Right, "A"), Some(observation(Hand::Left)));
        assert!(!d.is_success(), "got {:?}", d);
        assert_eq!(d.reason, Some(FailureReason::NoMatch));
        assert_eq!(d.score_percent, 0);
    }

    #[test]
    fn test_scenario_scaled_copy_succeeds() {
        let engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v.clone())]);
        let scaled: Vec<f32> = v.iter().map(|x| x * 0.5).collect();

        let d = engine.evaluate(&store, &SignKey::new(Hand::Right, "A"), &scaled);
        assert!(d.is_success());
    }

    #[test]
    fn test_scenario_mirrored_query_needs_left_reference() {
        let engine = MatchDecisionEngine::new(&test_config());
        let codec = *engine.codec();
        let v = reference_vector(&codec);
        let mirrored = codec.mirror(&v).unwrap();
        let left_a = SignKey::new(Hand::Left, "A");

        let right_only = store_with(vec![record("RIGHT A 1", v.clone())]);
        let d = engine.evaluate(&right_only, &left_a, &mirrored);
        assert_eq!(d.reason, Some(FailureReason::NoMatch));

        let both = store_with(vec![record("RIGHT A 1", v), record("LEFT A 1", mirrored.clone())]);
        let d = engine.evaluate(&both, &left_a, &mirrored);
        assert!(d.is_success(), "got {:?}", d);
    }

    #[test]
    fn test_scenario_wrong_sign() {
        let engine = MatchDecisionEngine::new(&test_config());
        let codec = *engine.codec();
        let store = store_with(vec![
            record("RIGHT A 1", unit(&codec, 0)),
            record("RIGHT B 1", unit(&codec, 1)),
        ]);
        // cos with B = 0.85, with A = 0.1
        let mut query = vec![0.0; codec.dimensions()];
        query[0] = 0.1;
        query[1] = 0.85;
        query[2] = (1.0f32 - 0.01 - 0.7225).sqrt();

        let d = engine.evaluate(&store, &SignKey::new(Hand::Right, "A"), &query);
        assert_eq!(d.reason, Some(FailureReason::WrongSign));
        assert_eq!(d.matched_symbol.as_deref(), Some("B"));
        assert_eq!(d.score_percent, 85);
    }

    #[test]
    fn test_scenario_below_threshold() {
        let engine = MatchDecisionEngine::new(&test_config());
        let codec = *engine.codec();
        let store = store_with(vec![record("RIGHT A 1", unit(&codec, 0))]);
        let mut query = vec![0.0; codec.dimensions()];
        query[0] = 0.55;
        query[1] = (1.0f32 - 0.3025).sqrt();

        let d = engine.evaluate(&store, &SignKey::new(Hand::Right, "A"), &query);
        assert_eq!(d.status, DecisionStatus::Failure);
        assert_eq!(d.reason, Some(FailureReason::NoMatch));
        assert_eq!(d.score_percent, 55);
    }

    #[test]
    fn test_start_refused_without_reference_data() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);

        let err = engine.start(&store, SignKey::new(Hand::Right, "Z")).unwrap_err();
        assert!(err.to_string().contains("No reference data"));
        assert!(engine.is_idle());
        assert_eq!(engine.metrics().summary().attempts_refused, 1);
    }

    #[test]
    fn test_start_refused_on_dimension_mismatch() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let store = store_with(vec![record("RIGHT A 1", vec![1.0, 0.0, 0.0])]);
        assert!(engine.start(&store, SignKey::new(Hand::Right, "A")).is_err());
        assert!(engine.is_idle());
    }

    #[test]
    fn test_frames_ignored_during_countdown() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);
        let obs = observation(Hand::Right);

        engine.start(&store, SignKey::new(Hand::Right, "A")).unwrap();
        for i in 0..20 {
            assert!(engine.on_frame(&store, Some(&obs), i as f64 * 1000.0).unwrap().is_none());
        }
        assert_eq!(engine.sampler().collected(), 0);

        engine.tick();
        engine.tick();
        assert_eq!(engine.state().kind(), EngineStateKind::Countdown);
        engine.tick();
        assert_eq!(engine.state().kind(), EngineStateKind::Sampling);
    }

    #[test]
    fn test_no_hand_completes_with_no_match() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);

        let d = run_attempt(&mut engine, &store, SignKey::new(Hand::Right, "A"), None);
        assert_eq!(d.reason, Some(FailureReason::NoMatch));
        assert_eq!(d.score_percent, 0);
    }

    #[test]
    fn test_failure_cooldown_blocks_new_attempt() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);
        let target = SignKey::new(Hand::Right, "A");

        run_attempt(&mut engine, &store, target.clone(), None);
        assert_eq!(engine.state().kind(), EngineStateKind::Decided);
        assert!(engine.start(&store, target.clone()).is_err());

        for _ in 0..4 {
            engine.tick();
        }
        assert_eq!(engine.state().kind(), EngineStateKind::Decided);
        engine.tick();
        assert!(engine.is_idle());
        assert!(engine.start(&store, target).is_ok());
    }

    #[test]
    fn test_cancel_discards_partial_buffer() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);
        let target = SignKey::new(Hand::Right, "A");
        let obs = observation(Hand::Right);

        engine.start(&store, target.clone()).unwrap();
        for _ in 0..3 {
            engine.tick();
        }
        for i in 0..4 {
            engine.on_frame(&store, Some(&obs), i as f64 * 1000.0).unwrap();
        }
        assert_eq!(engine.sampler().collected(), 4);

        engine.cancel();
        assert!(engine.is_idle());
        assert_eq!(engine.sampler().collected(), 0);

        // A stale tick after cancel must not resurrect the old countdown
        engine.tick();
        assert!(engine.is_idle());

        let events = engine.drain_events();
        assert!(events.iter().any(|e| matches!(e, EngineEvent::Cancelled { target: Some(_) })));
        assert!(!events.iter().any(|e| matches!(e, EngineEvent::Decided { .. })));
    }

    #[test]
    fn test_events_report_progress_score_and_decision() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);

        run_attempt(&mut engine, &store, SignKey::new(Hand::Right, "A"), Some(observation(Hand::Right)));
        let events = engine.drain_events();

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::SampleProgress { collected, .. } => Some(*collected),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(events.contains(&EngineEvent::Scored { percent: 100 }));
        assert!(events.iter().any(|e| matches!(e, EngineEvent::Decided { .. })));
    }

    #[test]
    fn test_unavailable_is_distinct_and_recoverable() {
        let mut engine = MatchDecisionEngine::new(&test_config());
        let v = reference_vector(engine.codec());
        let store = store_with(vec![record("RIGHT A 1", v)]);
        let target = SignKey::new(Hand::Right, "A");

        engine.mark_unavailable(UnavailableReason::PoseCapabilityFailed);
        assert_eq!(
            engine.state(),
            &EngineState::Unavailable(UnavailableReason::PoseCapabilityFailed)
        );
        assert!(engine.start(&store, target.clone()).is_err());

        engine.recover();
        assert!(engine.is_idle());
        assert!(engine.start(&store, target).is_ok());
    }
}
