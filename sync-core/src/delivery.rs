//! Delivery state machine - NO I/O, just stage transitions.
//!
//! ```text
//! NotEntangled -> ClassicalSend -> Done(Fallback)
//! Entangled -> TryPrimary -> Done(Primary)
//!                   |
//!                   v (failed)
//!              TrySecondary -> Done(Secondary)
//!                   |
//!                   v (failed)
//!          TryFallbackLabelOnly -> Done(Fallback)
//! ```
//!
//! The fallback stage is local and cannot fail, so every walk through the
//! machine ends in `Done`.

use spacesync_types::{ActorId, Operation};
use std::fmt;

/// Stage that produced a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryStage {
    /// Enhanced channel, only for entangled peers.
    Primary,
    /// Messaging session service.
    Secondary,
    /// Classical, label-only delivery recorded locally.
    Fallback,
}

impl DeliveryStage {
    /// Stable lowercase name used in coordination metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DeliveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// No prior approval for this peer.
    NotEntangled,
    /// A prior decision for this peer succeeded.
    Entangled,
    /// Sending classically to a non-entangled peer.
    ClassicalSend,
    /// Trying the enhanced channel.
    TryPrimary,
    /// Trying the messaging session service.
    TrySecondary,
    /// Recording a labelled payload locally.
    TryFallbackLabelOnly,
    /// Finished.
    Done {
        /// Stage that succeeded.
        stage: DeliveryStage,
    },
}

/// Events driving the delivery state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// Begin delivery.
    Start,
    /// The current stage succeeded.
    Succeeded,
    /// The current stage failed.
    Failed,
}

impl DeliveryState {
    /// Initial state for a peer.
    pub fn new(entangled: bool) -> Self {
        if entangled {
            Self::Entangled
        } else {
            Self::NotEntangled
        }
    }

    /// Process an event and return the new state.
    pub fn on_event(self, event: DeliveryEvent) -> Self {
        use DeliveryEvent::*;
        match (self, event) {
            (Self::NotEntangled, Start) => Self::ClassicalSend,
            (Self::Entangled, Start) => Self::TryPrimary,

            (Self::TryPrimary, Succeeded) => Self::Done {
                stage: DeliveryStage::Primary,
            },
            (Self::TryPrimary, Failed) => Self::TrySecondary,

            (Self::TrySecondary, Succeeded) => Self::Done {
                stage: DeliveryStage::Secondary,
            },
            (Self::TrySecondary, Failed) => Self::TryFallbackLabelOnly,

            // Local stages terminate regardless of outcome.
            (Self::ClassicalSend | Self::TryFallbackLabelOnly, Succeeded | Failed) => {
                Self::Done {
                    stage: DeliveryStage::Fallback,
                }
            }

            // Invalid transitions - stay in current state
            (state, _) => state,
        }
    }

    /// Stage whose strategy must run in this state, if any.
    pub fn attempting(&self) -> Option<DeliveryStage> {
        match self {
            Self::TryPrimary => Some(DeliveryStage::Primary),
            Self::TrySecondary => Some(DeliveryStage::Secondary),
            Self::ClassicalSend | Self::TryFallbackLabelOnly => Some(DeliveryStage::Fallback),
            _ => None,
        }
    }

    /// Stage that completed the delivery, once done.
    pub fn completed(&self) -> Option<DeliveryStage> {
        match self {
            Self::Done { stage } => Some(*stage),
            _ => None,
        }
    }
}

/// Build the coordination operation recorded for a delivery.
///
/// Carries only who, to whom, which stage and what quality. The payload
/// itself is represented by its length and never by its content.
pub fn coordination_operation(
    from: &ActorId,
    to: &ActorId,
    stage: DeliveryStage,
    quality: f64,
    payload_len: usize,
    degraded: &[DeliveryStage],
) -> Operation {
    let degraded = degraded
        .iter()
        .map(DeliveryStage::as_str)
        .collect::<Vec<_>>()
        .join(",");

    Operation::new("deliver", format!("/deliveries/{}/{}", from, to))
        .with_value(serde_json::json!({
            "stage": stage.as_str(),
            "quality": quality,
        }))
        .with_meta("from", from.as_str())
        .with_meta("to", to.as_str())
        .with_meta("stage", stage.as_str())
        .with_meta("quality", format!("{:.3}", quality))
        .with_meta("payload_len", payload_len.to_string())
        .with_meta("degraded", degraded)
}
