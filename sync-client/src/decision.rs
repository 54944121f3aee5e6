//! Decision engine: gathers the inputs of the readiness formula.
//!
//! Every input except the peer's similarity is optional. Failed calls
//! degrade to defaults, so a decision is always produced.

use spacesync_core::{
    classify_advisory, evaluate, Advisory, DecisionInputs, DecisionParams, DecisionResult,
    PeerRecord,
};
use spacesync_types::wire::{AdvisoryRequest, SimulationRequest};
use spacesync_types::{ActorId, SpaceId};
use thiserror::Error;

use crate::api::SpaceApi;
use crate::transport::{Transport, TransportError};

/// The advisory service could not be consulted.
///
/// Never surfaced to callers; resolved to [`Advisory::Unavailable`].
#[derive(Debug, Error)]
#[error("advisory unavailable: {0}")]
pub struct AdvisoryUnavailable(#[from] TransportError);

/// Which optional inputs to gather.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionOptions {
    /// Consult the advisory service.
    pub advisory: bool,
    /// Run a link simulation.
    pub simulate: bool,
}

impl Default for DecisionOptions {
    fn default() -> Self {
        Self {
            advisory: true,
            simulate: true,
        }
    }
}

/// Computes whether linking to a peer may proceed.
pub struct DecisionEngine<T> {
    api: SpaceApi<T>,
    space: SpaceId,
    actor: ActorId,
    options: DecisionOptions,
    params: DecisionParams,
}

impl<T: Transport> DecisionEngine<T> {
    /// Create an engine with the default formula constants.
    pub fn new(api: SpaceApi<T>, space: SpaceId, actor: ActorId, options: DecisionOptions) -> Self {
        Self {
            api,
            space,
            actor,
            options,
            params: DecisionParams::default(),
        }
    }

    /// Decide on `peer`. Never fails.
    pub async fn decide(&self, peer: &PeerRecord) -> DecisionResult {
        let phase_coherence = match self.api.snapshot(&self.space).await {
            Ok(snapshot) => snapshot.phase.map(|p| p.coherence),
            Err(e) => {
                tracing::warn!("Snapshot unavailable, assuming neutral phase: {}", e);
                None
            }
        };

        let (advisory, simulated_strength) = tokio::join!(
            self.advisory(peer),
            self.simulate(peer, phase_coherence)
        );

        let advisory = match advisory {
            Ok(advisory) => advisory,
            Err(e) => {
                tracing::warn!("{}", e);
                Advisory::Unavailable
            }
        };

        let result = evaluate(
            &DecisionInputs {
                similarity: peer.similarity,
                phase_coherence,
                simulated_strength,
                advisory,
            },
            &self.params,
        );

        tracing::debug!(
            "Decision for {}: confidence {:.3}, proceed {}",
            peer.peer_id,
            result.confidence,
            result.proceed
        );
        result
    }

    async fn advisory(&self, peer: &PeerRecord) -> Result<Advisory, AdvisoryUnavailable> {
        if !self.options.advisory {
            return Ok(Advisory::Skipped);
        }
        let guidance = self
            .api
            .advisory(&AdvisoryRequest {
                from: self.actor.clone(),
                to: peer.peer_id.clone(),
                similarity: peer.similarity,
            })
            .await?;
        Ok(classify_advisory(&guidance))
    }

    async fn simulate(&self, peer: &PeerRecord, phase_coherence: Option<f64>) -> Option<f64> {
        if !self.options.simulate {
            return None;
        }
        let request = SimulationRequest {
            from: self.actor.clone(),
            to: peer.peer_id.clone(),
            similarity: peer.similarity,
            phase_coherence: phase_coherence.unwrap_or(self.params.neutral_coherence),
        };
        match self.api.simulate(&request).await {
            Ok(strength) => Some(strength),
            Err(e) => {
                tracing::warn!("Simulation unavailable, skipping blend: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiTimeouts;
    use crate::transport::{Method, MockReply, MockTransport};
    use serde_json::json;
    use spacesync_core::{score_peer, ScoringParams};
    use spacesync_types::wire::SessionEntry;
    use std::sync::Arc;

    const EPS: f64 = 1e-9;

    fn peer(similarity: f64) -> PeerRecord {
        let entry = SessionEntry {
            session_id: "sess-bob".into(),
            actor_id: "bob".into(),
            display_name: "Bob".into(),
            online: true,
            last_seen: 0,
        };
        let score = score_peer(None, &ScoringParams::default());
        let mut record = PeerRecord::discovered(&entry, score, 1);
        record.similarity = similarity;
        record
    }

    fn engine(
        mock: &MockTransport,
        options: DecisionOptions,
    ) -> (SpaceId, DecisionEngine<MockTransport>) {
        let space = mock.seed_space("demo-space").id;
        let api = SpaceApi::new(Arc::new(mock.clone()), ApiTimeouts::default());
        let engine = DecisionEngine::new(api, space.clone(), "alice".into(), options);
        (space, engine)
    }

    #[tokio::test]
    async fn all_enhancements_missing_still_decides() {
        let mock = MockTransport::new();
        let (_, engine) = engine(&mock, DecisionOptions::default());

        let result = engine.decide(&peer(0.9)).await;

        // No phase data, no simulation, advisory unavailable.
        assert!((result.confidence - 1.0).abs() < EPS);
        assert!(result.proceed);
        assert_eq!(result.advisory, Advisory::Unavailable);
        assert!(!result.simulated);
    }

    #[tokio::test]
    async fn coherence_without_simulation() {
        let mock = MockTransport::new();
        let (space, engine) = engine(&mock, DecisionOptions::default());
        mock.set_phase_coherence(&space, 0.8);

        let result = engine.decide(&peer(0.9)).await;

        // 0.9 * 1.15 = 1.035 > 0.8 -> +0.1, clamped to 1.0
        assert!(result.breakthrough);
        assert!((result.confidence - 1.0).abs() < EPS);
    }

    #[tokio::test]
    async fn simulation_is_blended() {
        let mock = MockTransport::new();
        let (space, engine) = engine(&mock, DecisionOptions::default());
        mock.set_phase_coherence(&space, 0.5);
        mock.set_route(
            Method::Post,
            "/simulation/run",
            MockReply::ok(json!({ "strength": 0.2 })),
        );

        let result = engine.decide(&peer(0.5)).await;

        // 0.6 * 0.5 + 0.4 * 0.2 = 0.38
        assert!(result.simulated);
        assert!((result.confidence - 0.38).abs() < EPS);
        assert!(!result.proceed);
    }

    #[tokio::test]
    async fn negative_advisory_vetoes() {
        let mock = MockTransport::new();
        let (_, engine) = engine(&mock, DecisionOptions::default());
        mock.set_route(
            Method::Post,
            "/advisory",
            MockReply::ok(json!({ "guidance": "This link is NOT RECOMMENDED." })),
        );

        let result = engine.decide(&peer(0.9)).await;

        assert!(result.confidence <= 0.3 + EPS);
        assert!(!result.proceed);
        assert!(matches!(result.advisory, Advisory::Rejected { .. }));
    }

    #[tokio::test]
    async fn disabled_inputs_are_not_requested() {
        let mock = MockTransport::new();
        let (_, engine) = engine(
            &mock,
            DecisionOptions {
                advisory: false,
                simulate: false,
            },
        );

        let result = engine.decide(&peer(0.4)).await;

        assert_eq!(result.advisory, Advisory::Skipped);
        assert_eq!(mock.request_count(Method::Post, "/advisory"), 0);
        assert_eq!(mock.request_count(Method::Post, "/simulation/run"), 0);
    }

    #[tokio::test]
    async fn snapshot_failure_uses_neutral_phase() {
        let mock = MockTransport::new();
        let (space, engine) = engine(&mock, DecisionOptions::default());
        mock.set_phase_coherence(&space, 1.0);
        mock.fail_next(
            Method::Get,
            &format!("/spaces/{}/snapshot", space),
            TransportError::Timeout,
        );

        let result = engine.decide(&peer(0.6)).await;
        assert!((result.confidence - 0.6).abs() < EPS);
    }
}
