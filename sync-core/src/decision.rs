//! Decision formula gating entanglement with a peer.
//!
//! The strength of a prospective link is combined in a fixed order:
//!
//! 1. base similarity
//! 2. phase coherence amplifier `1 + (coherence - 0.5) * gain`
//! 3. optional simulated strength, blended 60/40 with the running value
//! 4. breakthrough boost if the running value already exceeds a threshold
//! 5. clamp to `[0, 1]`
//!
//! Steps 3 and 4 look at the partially combined value, so the order is part
//! of the behavior. An advisory verdict can veto the result by capping the
//! confidence below the threshold.

use spacesync_types::{ActorId, Operation};

use crate::scoring::clamp_unit;

/// Phrases that mark advisory guidance as negative.
pub const NEGATIVE_SENTINELS: &[&str] = &[
    "do not proceed",
    "not recommended",
    "incompatible",
    "reject",
    "abort",
];

/// Classified advisory guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Guidance without any negative sentinel.
    Approved,
    /// Guidance containing a negative sentinel.
    Rejected {
        /// The sentinel that matched.
        phrase: String,
    },
    /// The advisory call failed; treated as approved.
    Unavailable,
    /// The advisory step is disabled.
    Skipped,
}

impl Advisory {
    /// Whether this verdict allows the action to proceed.
    pub fn approves(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Classify free-text guidance.
///
/// Negative only if the text contains one of [`NEGATIVE_SENTINELS`]
/// (case-insensitive). Anything else, including empty text, is approval.
pub fn classify_advisory(guidance: &str) -> Advisory {
    let lowered = guidance.to_lowercase();
    NEGATIVE_SENTINELS
        .iter()
        .find(|phrase| lowered.contains(*phrase))
        .map(|phrase| Advisory::Rejected {
            phrase: (*phrase).to_string(),
        })
        .unwrap_or(Advisory::Approved)
}

/// Fixed constants of the decision formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionParams {
    /// Gain `k` of the phase coherence amplifier.
    pub phase_gain: f64,
    /// Coherence assumed when the snapshot has no phase data.
    pub neutral_coherence: f64,
    /// Weight of the simulated strength in the blend (running value gets the rest).
    pub simulation_weight: f64,
    /// Running value above which the breakthrough boost applies.
    pub breakthrough_threshold: f64,
    /// Flat boost applied past the breakthrough threshold.
    pub breakthrough_boost: f64,
    /// Minimum confidence for `proceed`.
    pub resonance_threshold: f64,
    /// Confidence ceiling imposed by a negative advisory.
    pub advisory_veto_cap: f64,
    /// Advisory confidence reported when the advisory is unavailable or skipped.
    pub default_advisory_confidence: f64,
}

impl Default for DecisionParams {
    fn default() -> Self {
        Self {
            phase_gain: 0.5,
            neutral_coherence: 0.5,
            simulation_weight: 0.4,
            breakthrough_threshold: 0.8,
            breakthrough_boost: 0.1,
            resonance_threshold: 0.7,
            advisory_veto_cap: 0.3,
            default_advisory_confidence: 0.5,
        }
    }
}

/// Inputs of one decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionInputs {
    /// Similarity score of the peer.
    pub similarity: f64,
    /// Phase coherence of the space, if known.
    pub phase_coherence: Option<f64>,
    /// Simulated link strength, if the simulation call succeeded.
    pub simulated_strength: Option<f64>,
    /// Classified advisory verdict.
    pub advisory: Advisory,
}

/// Outcome of one decision. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResult {
    /// Whether the state-changing action may proceed.
    pub proceed: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Advisory verdict the decision was made with.
    pub advisory: Advisory,
    /// Confidence attributed to the advisory step.
    pub advisory_confidence: f64,
    /// Whether a simulated strength was blended in.
    pub simulated: bool,
    /// Whether the breakthrough boost applied.
    pub breakthrough: bool,
}

/// Evaluate the decision formula.
///
/// An unavailable or skipped advisory counts as approval: confidence and
/// `proceed` are exactly what an approving advisory would give, and only
/// `advisory_confidence` reports the fixed default instead of 1.0.
pub fn evaluate(inputs: &DecisionInputs, params: &DecisionParams) -> DecisionResult {
    // 1. base similarity
    let mut strength = finite_or(inputs.similarity, 0.0);

    // 2. phase coherence amplifier
    let coherence = inputs
        .phase_coherence
        .filter(|c| c.is_finite())
        .unwrap_or(params.neutral_coherence);
    strength *= 1.0 + (coherence - 0.5) * params.phase_gain;

    // 3. simulated strength blend
    let simulated = inputs.simulated_strength.filter(|s| s.is_finite());
    if let Some(sim) = simulated {
        strength = (1.0 - params.simulation_weight) * strength + params.simulation_weight * sim;
    }

    // 4. breakthrough
    let breakthrough = strength > params.breakthrough_threshold;
    if breakthrough {
        strength += params.breakthrough_boost;
    }

    // 5. clamp
    let mut confidence = clamp_unit(strength);

    let advisory_confidence = match &inputs.advisory {
        Advisory::Approved => 1.0,
        Advisory::Rejected { .. } => {
            confidence = confidence.min(params.advisory_veto_cap);
            0.0
        }
        Advisory::Unavailable | Advisory::Skipped => params.default_advisory_confidence,
    };

    DecisionResult {
        proceed: confidence >= params.resonance_threshold,
        confidence,
        advisory: inputs.advisory.clone(),
        advisory_confidence,
        simulated: simulated.is_some(),
        breakthrough,
    }
}

/// Build the coordination operation recorded for an approved link.
pub fn link_operation(from: &ActorId, to: &ActorId, confidence: f64) -> Operation {
    Operation::new("link", format!("/links/{}/{}", from, to))
        .with_value(serde_json::json!({ "confidence": confidence }))
        .with_meta("from", from.as_str())
        .with_meta("to", to.as_str())
        .with_meta("confidence", format!("{:.3}", confidence))
}

/// Peers `from` has recorded links to in a snapshot state.
///
/// Link operations are stored under `/links/{from}/{to}`; other keys are
/// ignored. The result is sorted.
pub fn linked_peers(state: &serde_json::Value, from: &ActorId) -> Vec<ActorId> {
    let prefix = format!("/links/{}/", from);
    let mut peers: Vec<ActorId> = state
        .as_object()
        .into_iter()
        .flat_map(|map| map.keys())
        .filter_map(|key| key.strip_prefix(&prefix))
        .filter(|to| !to.is_empty() && !to.contains('/'))
        .map(ActorId::from)
        .collect();
    peers.sort();
    peers.dedup();
    peers
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
