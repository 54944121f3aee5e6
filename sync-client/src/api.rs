//! Typed calls to the space service.
//!
//! [`SpaceApi`] turns the service endpoints into typed methods and picks the
//! timeout of each call by its weight.

use serde::Serialize;
use spacesync_types::wire::{
    AdvisoryRequest, AdvisoryResponse, CreateSpace, DeltaAck, EncodeRequest, EncodeResponse,
    EnhancedAck, EnhancedSend, JoinRequest, JoinResponse, MessageSend, SimulationRequest,
    SimulationResponse, Snapshot, SpaceHandle, Stats,
};
use spacesync_types::{Delta, IdempotencyKey, SessionId, SpaceId};
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{ApiRequest, Transport, TransportError, DEFAULT_TIMEOUT};

/// Per-call timeouts, by call weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    /// Timeout of ordinary calls.
    pub default: Duration,
    /// Timeout of listing calls.
    pub listing: Duration,
    /// Timeout of simulation runs.
    pub simulation: Duration,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self {
            default: DEFAULT_TIMEOUT,
            listing: Duration::from_secs(10),
            simulation: Duration::from_secs(120),
        }
    }
}

/// Typed client of the space service.
#[derive(Debug)]
pub struct SpaceApi<T> {
    transport: Arc<T>,
    timeouts: ApiTimeouts,
}

impl<T> Clone for SpaceApi<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            timeouts: self.timeouts,
        }
    }
}

fn body<S: Serialize>(value: &S) -> Result<serde_json::Value, TransportError> {
    serde_json::to_value(value).map_err(|e| TransportError::Decode(e.to_string()))
}

impl<T: Transport> SpaceApi<T> {
    /// Wrap a transport.
    pub fn new(transport: Arc<T>, timeouts: ApiTimeouts) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Configured timeouts.
    pub fn timeouts(&self) -> ApiTimeouts {
        self.timeouts
    }

    /// `GET /spaces?name=`
    pub async fn list_spaces(&self, name: &str) -> Result<Vec<SpaceHandle>, TransportError> {
        let request = ApiRequest::get("/spaces")
            .with_query("name", name)
            .with_timeout(self.timeouts.listing);
        self.transport.request(request).await?.json()
    }

    /// `POST /spaces` with an idempotency key.
    pub async fn create_space(
        &self,
        name: &str,
        key: &IdempotencyKey,
    ) -> Result<SpaceHandle, TransportError> {
        let request = ApiRequest::post(
            "/spaces",
            body(&CreateSpace {
                name: name.to_string(),
            })?,
        )
        .with_idempotency_key(key.as_str())
        .with_timeout(self.timeouts.default);
        self.transport.request(request).await?.json()
    }

    /// `POST /spaces/{id}/sessions`
    pub async fn join(
        &self,
        space: &SpaceId,
        join: &JoinRequest,
    ) -> Result<SessionId, TransportError> {
        let request = ApiRequest::post(format!("/spaces/{}/sessions", space), body(join)?)
            .with_timeout(self.timeouts.default);
        let response: JoinResponse = self.transport.request(request).await?.json()?;
        Ok(response.session_id)
    }

    /// `GET /spaces/{id}/snapshot`
    pub async fn snapshot(&self, space: &SpaceId) -> Result<Snapshot, TransportError> {
        let request = ApiRequest::get(format!("/spaces/{}/snapshot", space))
            .with_timeout(self.timeouts.default);
        self.transport.request(request).await?.json()
    }

    /// `GET /spaces/{id}/stats`
    pub async fn stats(&self, space: &SpaceId) -> Result<Stats, TransportError> {
        let request = ApiRequest::get(format!("/spaces/{}/stats", space))
            .with_timeout(self.timeouts.default);
        self.transport.request(request).await?.json()
    }

    /// `POST /spaces/{id}/deltas`
    ///
    /// A version mismatch comes back as a 409 [`TransportError::Status`].
    pub async fn submit_delta(
        &self,
        space: &SpaceId,
        delta: &Delta,
    ) -> Result<Snapshot, TransportError> {
        let request = ApiRequest::post(format!("/spaces/{}/deltas", space), body(delta)?)
            .with_timeout(self.timeouts.default);
        let ack: DeltaAck = self.transport.request(request).await?.json()?;
        Ok(ack.snapshot)
    }

    /// `POST /resonance/encode`, returning the baseline similarity.
    pub async fn encode(&self, concept: &str, tags: &[String]) -> Result<f64, TransportError> {
        let request = ApiRequest::post(
            "/resonance/encode",
            body(&EncodeRequest {
                concept: concept.to_string(),
                tags: tags.to_vec(),
            })?,
        )
        .with_timeout(self.timeouts.default);
        let response: EncodeResponse = self.transport.request(request).await?.json()?;
        Ok(response.resonance)
    }

    /// `POST /advisory`, returning the guidance text.
    pub async fn advisory(&self, advisory: &AdvisoryRequest) -> Result<String, TransportError> {
        let request = ApiRequest::post("/advisory", body(advisory)?)
            .with_timeout(self.timeouts.default);
        let response: AdvisoryResponse = self.transport.request(request).await?.json()?;
        Ok(response.guidance)
    }

    /// `POST /simulation/run`, with the long timeout.
    pub async fn simulate(&self, simulation: &SimulationRequest) -> Result<f64, TransportError> {
        let request = ApiRequest::post("/simulation/run", body(simulation)?)
            .with_timeout(self.timeouts.simulation);
        let response: SimulationResponse = self.transport.request(request).await?.json()?;
        Ok(response.strength)
    }

    /// `POST /spaces/{id}/channels/enhanced`, returning the reported fidelity.
    pub async fn send_enhanced(
        &self,
        space: &SpaceId,
        send: &EnhancedSend,
    ) -> Result<Option<f64>, TransportError> {
        let request = ApiRequest::post(format!("/spaces/{}/channels/enhanced", space), body(send)?)
            .with_timeout(self.timeouts.default);
        let response = self.transport.request(request).await?;
        if response.body.is_null() {
            return Ok(None);
        }
        let ack: EnhancedAck = response.json()?;
        Ok(ack.fidelity)
    }

    /// `POST /sessions/{sid}/messages`
    pub async fn send_message(
        &self,
        session: &SessionId,
        message: &MessageSend,
    ) -> Result<(), TransportError> {
        let request = ApiRequest::post(format!("/sessions/{}/messages", session), body(message)?)
            .with_timeout(self.timeouts.default);
        self.transport.request(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, MockReply, MockTransport};
    use serde_json::json;

    fn api() -> (MockTransport, SpaceApi<MockTransport>) {
        let mock = MockTransport::new();
        let api = SpaceApi::new(Arc::new(mock.clone()), ApiTimeouts::default());
        (mock, api)
    }

    #[tokio::test]
    async fn listing_uses_short_timeout() {
        let (mock, api) = api();
        api.list_spaces("demo").await.unwrap();

        let sent = mock.requests();
        assert_eq!(sent[0].timeout, Duration::from_secs(10));
        assert_eq!(sent[0].query_param("name"), Some("demo"));
    }

    #[tokio::test]
    async fn simulation_uses_long_timeout() {
        let (mock, api) = api();
        mock.set_route(
            Method::Post,
            "/simulation/run",
            MockReply::ok(json!({ "strength": 0.4 })),
        );

        let strength = api
            .simulate(&SimulationRequest {
                from: "a".into(),
                to: "b".into(),
                similarity: 0.5,
                phase_coherence: 0.5,
            })
            .await
            .unwrap();

        assert_eq!(strength, 0.4);
        assert_eq!(mock.requests()[0].timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn create_sends_idempotency_key() {
        let (mock, api) = api();
        let key = IdempotencyKey::for_space("demo");
        let space = api.create_space("demo", &key).await.unwrap();

        assert_eq!(space.name, "demo");
        assert_eq!(
            mock.requests()[0].idempotency_key.as_deref(),
            Some(key.as_str())
        );
    }

    #[tokio::test]
    async fn join_returns_session() {
        let (mock, api) = api();
        let space = mock.seed_space("demo");
        let session = api
            .join(
                &space.id,
                &JoinRequest {
                    actor_id: "alice".into(),
                    display_name: "Alice".into(),
                },
            )
            .await
            .unwrap();
        assert!(session.as_str().starts_with("sess_"));
    }

    #[tokio::test]
    async fn enhanced_with_empty_body_has_no_fidelity() {
        let (mock, api) = api();
        let space = mock.seed_space("demo");
        mock.set_route(
            Method::Post,
            &format!("/spaces/{}/channels/enhanced", space.id),
            MockReply::Json {
                status: 204,
                body: serde_json::Value::Null,
            },
        );

        let fidelity = api
            .send_enhanced(
                &space.id,
                &EnhancedSend {
                    from: "a".into(),
                    to: "b".into(),
                    payload: "hi".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(fidelity, None);
    }

    #[tokio::test]
    async fn missing_optional_service_is_an_error() {
        let (_mock, api) = api();
        let err = api.encode("Bob", &[]).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
