// src/decision/policy.rs
//
// Accept/reject policy for one attempt, evaluated in order:
//   1. no match at all                     → failure, NO_MATCH
//   2. similarity < threshold              → failure, NO_MATCH (score kept)
//   3. hand or symbol differs from target  → failure, WRONG_SIGN
//   4. otherwise                           → success

use crate::labels::SignKey;
use crate::store::MatchResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    NoMatch,
    WrongSign,
}

/// Outcome handed to UI and session recording
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub status: DecisionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_symbol: Option<String>,
    pub score_percent: u8,
}

impl Decision {
    pub fn is_success(&self) -> bool {
        self.status == DecisionStatus::Success
    }

    fn success(score_percent: u8) -> Self {
        Self {
            status: DecisionStatus::Success,
            reason: None,
            matched_symbol: None,
            score_percent,
        }
    }

    fn failure(reason: FailureReason, matched_symbol: Option<String>, score_percent: u8) -> Self {
        Self {
            status: DecisionStatus::Failure,
            reason: Some(reason),
            matched_symbol,
            score_percent,
        }
    }
}

/// Similarity as a 0-100 integer percentage
pub fn score_percent(similarity: f32) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn decide(target: &SignKey, best: Option<&MatchResult>, threshold: f32) -> Decision {
    let Some(best) = best else {
        return Decision::failure(FailureReason::NoMatch, None, 0);
    };

    let score = score_percent(best.similarity);
    if best.similarity < threshold {
        return Decision::failure(FailureReason::NoMatch, None, score);
    }

    if best.label.hand != target.hand || best.label.symbol != target.symbol {
        return Decision::failure(FailureReason::WrongSign, Some(best.label.symbol.clone()), score);
    }

    Decision::success(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::ReferenceLabel;
    use crate::types::Hand;

    fn matched(label: &str, similarity: f32) -> MatchResult {
        MatchResult {
            label: label.parse::<ReferenceLabel>().unwrap(),
            similarity,
        }
    }

    fn target_a() -> SignKey {
        SignKey::new(Hand::Right, "A")
    }

    #[test]
    fn test_no_match() {
        let d = decide(&target_a(), None, 0.7);
        assert_eq!(d.status, DecisionStatus::Failure);
        assert_eq!(d.reason, Some(FailureReason::NoMatch));
        assert_eq!(d.score_percent, 0);
    }

    #[test]
    fn test_below_threshold_keeps_score() {
        let d = decide(&target_a(), Some(&matched("RIGHT A AVERAGE", 0.55)), 0.7);
        assert_eq!(d.reason, Some(FailureReason::NoMatch));
        assert_eq!(d.score_percent, 55);
        assert_eq!(d.matched_symbol, None);
    }

    #[test]
    fn test_wrong_symbol() {
        let d = decide(&target_a(), Some(&matched("RIGHT B AVERAGE", 0.85)), 0.7);
        assert_eq!(d.reason, Some(FailureReason::WrongSign));
        assert_eq!(d.matched_symbol.as_deref(), Some("B"));
        assert_eq!(d.score_percent, 85);
    }

    #[test]
    fn test_wrong_hand_same_symbol() {
        let d = decide(&target_a(), Some(&matched("LEFT A AVERAGE", 0.9)), 0.7);
        assert_eq!(d.reason, Some(FailureReason::WrongSign));
        assert_eq!(d.matched_symbol.as_deref(), Some("A"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let d = decide(&target_a(), Some(&matched("RIGHT A 1", 0.7)), 0.7);
        assert!(d.is_success());
        assert_eq!(d.score_percent, 70);
    }

    #[test]
    fn test_decision_json_shape() {
        let d = decide(&target_a(), Some(&matched("RIGHT B 1", 0.85)), 0.7);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "WRONG_SIGN");
        assert_eq!(json["matchedSymbol"], "B");
        assert_eq!(json["scorePercent"], 85);

        let ok = decide(&target_a(), Some(&matched("RIGHT A 1", 0.95)), 0.7);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("reason").is_none());
    }
}
