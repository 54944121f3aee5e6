//! Delivery pipeline with graceful degradation.
//!
//! Drives the [`DeliveryState`] machine from `spacesync-core`, running one
//! [`DeliveryStrategy`] per attempted stage. The last stage is local and
//! cannot fail, so [`DeliveryPipeline::deliver`] always produces an outcome.
//!
//! Payload content stays on this client: the shared space only receives a
//! coordination delta describing the delivery, and the content is kept in
//! the local [`Outbox`].

use async_trait::async_trait;
use dashmap::DashSet;
use spacesync_core::{coordination_operation, DeliveryEvent, DeliveryStage, DeliveryState};
use spacesync_types::wire::{EnhancedSend, MessageSend};
use spacesync_types::{ActorId, PeerId, SessionId, SpaceId, Version};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::api::SpaceApi;
use crate::sync::{now_ms, DeltaSynchronizer};
use crate::transport::{Transport, TransportError};

/// Quality of a primary delivery when the service reports no fidelity.
pub const DEFAULT_PRIMARY_FIDELITY: f64 = 0.95;

/// Quality of a delivery through the messaging service.
pub const SECONDARY_QUALITY: f64 = 0.7;

/// Quality of a classical, label-only delivery.
pub const CLASSICAL_QUALITY: f64 = 0.5;

/// Prefix of payloads recorded by the classical stage.
pub const CLASSICAL_LABEL: &str = "[classical]";

/// Peers with an approved link.
pub type Entanglements = Arc<DashSet<PeerId>>;

/// What a successful strategy produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    /// Delivery quality in `[0, 1]`.
    pub quality: f64,
    /// Payload as recorded by this stage.
    pub recorded_payload: String,
}

/// One way of delivering a payload.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    /// Stage this strategy implements.
    fn stage(&self) -> DeliveryStage;

    /// Try to deliver `payload` to `to`.
    async fn attempt(&self, to: &PeerId, payload: &str) -> Result<StrategyOutput, TransportError>;
}

/// Enhanced channel of the space.
pub struct PrimaryChannel<T> {
    api: SpaceApi<T>,
    space: SpaceId,
    from: ActorId,
}

impl<T> PrimaryChannel<T> {
    /// Create the strategy.
    pub fn new(api: SpaceApi<T>, space: SpaceId, from: ActorId) -> Self {
        Self { api, space, from }
    }
}

#[async_trait]
impl<T: Transport> DeliveryStrategy for PrimaryChannel<T> {
    fn stage(&self) -> DeliveryStage {
        DeliveryStage::Primary
    }

    async fn attempt(&self, to: &PeerId, payload: &str) -> Result<StrategyOutput, TransportError> {
        let fidelity = self
            .api
            .send_enhanced(
                &self.space,
                &EnhancedSend {
                    from: self.from.clone(),
                    to: to.clone(),
                    payload: payload.to_string(),
                },
            )
            .await?;

        let quality = fidelity
            .filter(|f| f.is_finite())
            .map(|f| f.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_PRIMARY_FIDELITY);

        Ok(StrategyOutput {
            quality,
            recorded_payload: payload.to_string(),
        })
    }
}

/// Messaging session service.
pub struct SecondaryMessaging<T> {
    api: SpaceApi<T>,
    session: SessionId,
}

impl<T> SecondaryMessaging<T> {
    /// Create the strategy, sending through `session`.
    pub fn new(api: SpaceApi<T>, session: SessionId) -> Self {
        Self { api, session }
    }
}

#[async_trait]
impl<T: Transport> DeliveryStrategy for SecondaryMessaging<T> {
    fn stage(&self) -> DeliveryStage {
        DeliveryStage::Secondary
    }

    async fn attempt(&self, to: &PeerId, payload: &str) -> Result<StrategyOutput, TransportError> {
        self.api
            .send_message(
                &self.session,
                &MessageSend {
                    to: to.clone(),
                    body: payload.to_string(),
                },
            )
            .await?;

        Ok(StrategyOutput {
            quality: SECONDARY_QUALITY,
            recorded_payload: payload.to_string(),
        })
    }
}

/// Label-only delivery. Local, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicalLabel;

#[async_trait]
impl DeliveryStrategy for ClassicalLabel {
    fn stage(&self) -> DeliveryStage {
        DeliveryStage::Fallback
    }

    async fn attempt(&self, _to: &PeerId, payload: &str) -> Result<StrategyOutput, TransportError> {
        Ok(classical(payload))
    }
}

fn classical(payload: &str) -> StrategyOutput {
    StrategyOutput {
        quality: CLASSICAL_QUALITY,
        recorded_payload: format!("{} {}", CLASSICAL_LABEL, payload),
    }
}

/// A stage that failed before the winning one.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    /// Stage that failed.
    pub stage: DeliveryStage,
    /// Why.
    pub error: String,
}

/// Result of one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    /// Stage that delivered.
    pub stage: DeliveryStage,
    /// Delivery quality in `[0, 1]`.
    pub quality: f64,
    /// Payload as recorded.
    pub payload: String,
    /// Stages that failed first, in order.
    pub degraded: Vec<StageFailure>,
    /// Version produced by the coordination delta, `None` if recording failed.
    pub coordination_version: Option<Version>,
}

/// A delivered payload kept on this client.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    /// Recipient.
    pub to: PeerId,
    /// Stage that delivered.
    pub stage: DeliveryStage,
    /// Payload as recorded.
    pub payload: String,
    /// Delivery time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Bounded ring of delivered payloads. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct Outbox {
    entries: Arc<Mutex<VecDeque<OutboxEntry>>>,
    capacity: usize,
}

impl Outbox {
    /// Create an outbox holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest if full.
    pub fn push(&self, entry: OutboxEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> Vec<OutboxEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the outbox is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Delivers payloads through the ordered strategies.
pub struct DeliveryPipeline<T> {
    from: ActorId,
    strategies: Vec<Box<dyn DeliveryStrategy>>,
    entanglements: Entanglements,
    sync: Arc<DeltaSynchronizer<T>>,
    outbox: Outbox,
    coordination_attempts: u32,
}

impl<T: Transport + 'static> DeliveryPipeline<T> {
    /// Create a pipeline with the standard strategies.
    pub fn new(
        api: SpaceApi<T>,
        sync: Arc<DeltaSynchronizer<T>>,
        from: ActorId,
        entanglements: Entanglements,
        outbox: Outbox,
    ) -> Self {
        let strategies: Vec<Box<dyn DeliveryStrategy>> = vec![
            Box::new(PrimaryChannel::new(
                api.clone(),
                sync.space().clone(),
                from.clone(),
            )),
            Box::new(SecondaryMessaging::new(api, sync.session().clone())),
            Box::new(ClassicalLabel),
        ];
        Self {
            from,
            strategies,
            entanglements,
            sync,
            outbox,
            coordination_attempts: 3,
        }
    }

    /// Replace the strategies. Order does not matter; stages are matched by kind.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn DeliveryStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Set how many times the coordination delta is attempted.
    pub fn with_coordination_attempts(mut self, attempts: u32) -> Self {
        self.coordination_attempts = attempts.max(1);
        self
    }

    /// Local outbox.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Deliver `payload` to `to`. Always returns an outcome.
    pub async fn deliver(&self, to: &PeerId, payload: &str) -> DeliveryOutcome {
        let entangled = self.entanglements.contains(to);
        let mut state = DeliveryState::new(entangled).on_event(DeliveryEvent::Start);
        let mut degraded = Vec::new();
        let mut output = None;

        while let Some(stage) = state.attempting() {
            tracing::debug!("Delivering to {} via {}", to, stage);
            let result = match self.strategies.iter().find(|s| s.stage() == stage) {
                Some(strategy) => strategy.attempt(to, payload).await,
                None => Err(TransportError::ConnectionFailed(format!(
                    "no {} strategy configured",
                    stage
                ))),
            };

            match result {
                Ok(out) => {
                    output = Some(out);
                    state = state.on_event(DeliveryEvent::Succeeded);
                }
                Err(e) => {
                    tracing::warn!("Delivery to {} via {} failed: {}", to, stage, e);
                    degraded.push(StageFailure {
                        stage,
                        error: e.to_string(),
                    });
                    state = state.on_event(DeliveryEvent::Failed);
                }
            }
        }

        let stage = state.completed().unwrap_or(DeliveryStage::Fallback);
        // Only a failing local stage leaves no output.
        let output = output.unwrap_or_else(|| classical(payload));

        let degraded_stages: Vec<DeliveryStage> = degraded.iter().map(|f| f.stage).collect();
        let operation = coordination_operation(
            &self.from,
            to,
            stage,
            output.quality,
            payload.len(),
            &degraded_stages,
        );
        let coordination_version = match self
            .sync
            .submit_with_retry(vec![operation], self.coordination_attempts)
            .await
        {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!("Recording delivery to {} failed: {}", to, e);
                None
            }
        };

        self.outbox.push(OutboxEntry {
            to: to.clone(),
            stage,
            payload: output.recorded_payload.clone(),
            timestamp: now_ms(),
        });

        tracing::info!(
            "Delivered to {} via {} (quality {:.2}, {} degraded)",
            to,
            stage,
            output.quality,
            degraded.len()
        );

        DeliveryOutcome {
            stage,
            quality: output.quality,
            payload: output.recorded_payload,
            degraded,
            coordination_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiTimeouts;
    use crate::transport::{Method, MockReply, MockTransport};
    use serde_json::json;

    const SECRET: &str = "meet at the usual place";

    struct Fixture {
        mock: MockTransport,
        space: SpaceId,
        pipeline: DeliveryPipeline<MockTransport>,
        entanglements: Entanglements,
    }

    fn fixture() -> Fixture {
        let mock = MockTransport::new();
        let space = mock.seed_space("demo-space").id;
        let api = SpaceApi::new(Arc::new(mock.clone()), ApiTimeouts::default());
        let sync = Arc::new(DeltaSynchronizer::new(
            api.clone(),
            space.clone(),
            "alice".into(),
            "sess-alice".into(),
        ));
        let entanglements = Entanglements::default();
        let pipeline = DeliveryPipeline::new(
            api,
            sync,
            "alice".into(),
            Arc::clone(&entanglements),
            Outbox::new(4),
        );
        Fixture {
            mock,
            space,
            pipeline,
            entanglements,
        }
    }

    fn enhanced(space: &SpaceId) -> String {
        format!("/spaces/{}/channels/enhanced", space)
    }

    // ===========================================
    // Stage Selection
    // ===========================================

    #[tokio::test]
    async fn not_entangled_goes_classical() {
        let f = fixture();

        let outcome = f.pipeline.deliver(&"bob".into(), SECRET).await;

        assert_eq!(outcome.stage, DeliveryStage::Fallback);
        assert_eq!(outcome.quality, CLASSICAL_QUALITY);
        assert_eq!(outcome.payload, format!("[classical] {}", SECRET));
        assert!(outcome.degraded.is_empty());
        assert_eq!(f.mock.request_count(Method::Post, &enhanced(&f.space)), 0);
    }

    #[tokio::test]
    async fn entangled_uses_primary_fidelity() {
        let f = fixture();
        f.entanglements.insert("bob".into());
        f.mock.set_route(
            Method::Post,
            &enhanced(&f.space),
            MockReply::ok(json!({ "fidelity": 0.88 })),
        );

        let outcome = f.pipeline.deliver(&"bob".into(), SECRET).await;

        assert_eq!(outcome.stage, DeliveryStage::Primary);
        assert_eq!(outcome.quality, 0.88);
        assert_eq!(outcome.payload, SECRET);
    }

    #[tokio::test]
    async fn primary_without_fidelity_uses_default() {
        let f = fixture();
        f.entanglements.insert("bob".into());
        f.mock
            .set_route(Method::Post, &enhanced(&f.space), MockReply::ok(json!({})));

        let outcome = f.pipeline.deliver(&"bob".into(), SECRET).await;
        assert_eq!(outcome.quality, DEFAULT_PRIMARY_FIDELITY);
    }

    #[tokio::test]
    async fn primary_failure_falls_to_secondary() {
        let f = fixture();
        f.entanglements.insert("bob".into());

        let outcome = f.pipeline.deliver(&"bob".into(), SECRET).await;

        assert_eq!(outcome.stage, DeliveryStage::Secondary);
        assert_eq!(outcome.quality, SECONDARY_QUALITY);
        assert_eq!(outcome.degraded.len(), 1);
        assert_eq!(outcome.degraded[0].stage, DeliveryStage::Primary);
        let sent = f.mock.sent_messages();
        assert_eq!(sent[0].0.as_str(), "sess-alice");
        assert_eq!(sent[0].1["to"], "bob");
    }

    #[tokio::test]
    async fn every_enhancement_failing_still_delivers() {
        let f = fixture();
        f.entanglements.insert("bob".into());
        f.mock.set_route(
            Method::Post,
            "/sessions/sess-alice/messages",
            MockReply::Error(TransportError::Timeout),
        );

        let outcome = f.pipeline.deliver(&"bob".into(), SECRET).await;

        assert_eq!(outcome.stage, DeliveryStage::Fallback);
        assert_eq!(
            outcome
                .degraded
                .iter()
                .map(|d| d.stage)
                .collect::<Vec<_>>(),
            vec![DeliveryStage::Primary, DeliveryStage::Secondary]
        );
        assert!(outcome.payload.starts_with(CLASSICAL_LABEL));
    }

    // ===========================================
    // Coordination and Outbox
    // ===========================================

    #[tokio::test]
    async fn exactly_one_coordination_delta_without_payload() {
        let f = fixture();
        f.entanglements.insert("bob".into());

        let outcome = f.pipeline.deliver(&"bob".into(), SECRET).await;

        assert_eq!(outcome.coordination_version, Some(Version::new(1)));
        let deltas = f.mock.deltas(&f.space);
        assert_eq!(deltas.len(), 1);
        let op = &deltas[0].operations[0];
        assert_eq!(op.op, "deliver");
        assert_eq!(op.meta["stage"], "secondary");
        assert_eq!(op.meta["degraded"], "primary");
        assert_eq!(op.meta["payload_len"], SECRET.len().to_string());
        for value in op.meta.values() {
            assert!(!value.contains(SECRET));
        }
        assert!(!serde_json::to_string(&deltas[0]).unwrap().contains(SECRET));
    }

    #[tokio::test]
    async fn coordination_failure_is_reported_not_raised() {
        let f = fixture();
        f.mock.set_route(
            Method::Get,
            &format!("/spaces/{}/snapshot", f.space),
            MockReply::status(500, "down"),
        );
        let pipeline = f.pipeline.with_coordination_attempts(1);

        let outcome = pipeline.deliver(&"bob".into(), SECRET).await;

        assert_eq!(outcome.stage, DeliveryStage::Fallback);
        assert_eq!(outcome.coordination_version, None);
        assert_eq!(pipeline.outbox().len(), 1);
    }

    #[tokio::test]
    async fn outbox_keeps_recorded_payloads() {
        let f = fixture();
        f.pipeline.deliver(&"bob".into(), "hello").await;

        let entries = f.pipeline.outbox().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to.as_str(), "bob");
        assert_eq!(entries[0].payload, "[classical] hello");
    }

    #[test]
    fn outbox_evicts_oldest() {
        let outbox = Outbox::new(2);
        for i in 0..3 {
            outbox.push(OutboxEntry {
                to: "bob".into(),
                stage: DeliveryStage::Fallback,
                payload: format!("m{}", i),
                timestamp: i,
            });
        }
        let payloads: Vec<String> = outbox.entries().into_iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn missing_strategy_counts_as_failure() {
        let f = fixture();
        f.entanglements.insert("bob".into());
        let pipeline = f.pipeline.with_strategies(vec![Box::new(ClassicalLabel)]);

        let outcome = pipeline.deliver(&"bob".into(), SECRET).await;

        assert_eq!(outcome.stage, DeliveryStage::Fallback);
        assert_eq!(outcome.degraded.len(), 2);
    }
}
