// src/decision/mod.rs
//
// Attempt lifecycle and the accept/reject decision.
//
//   engine: Idle → Countdown → Sampling → Decided → Idle
//   policy: best averaged match + target → Decision

pub mod engine;
pub mod policy;

pub use engine::{EngineState, EngineStateKind, MatchDecisionEngine, UnavailableReason};
pub use policy::{Decision, DecisionStatus, FailureReason};
