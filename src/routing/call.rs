//! Call signal relay.
//!
//! Invite/answer/candidate/end are forwarded to the addressed peer as-is,
//! stamped with the sender and the current time. Nothing is stored.

use crate::error::RouteError;
use crate::state::{ConnectionRegistry, DeliveryOutcome};
use chathub_proto::{CallRequest, CallSignal};
use tracing::debug;

pub struct CallSignalRelay<'a> {
    registry: &'a ConnectionRegistry,
}

impl<'a> CallSignalRelay<'a> {
    pub fn new(registry: &'a ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Forward `request` from `from` to `request.to`.
    ///
    /// An offline peer is not an error; the outcome says `Offline`.
    pub fn forward(&self, from: &str, request: CallRequest) -> Result<DeliveryOutcome, RouteError> {
        if request.to.is_empty() {
            return Err(RouteError::EmptyReceiver);
        }

        let action = request.action;
        let signal = CallSignal {
            action: action.as_str().to_string(),
            call_id: request.call_id,
            from: from.to_string(),
            to: request.to,
            call_type: request.call_type,
            accept: request.accept,
            content: request.content,
            created_at: chrono::Utc::now().timestamp(),
        };
        let payload = chathub_proto::encode(&signal)?;

        let outcome = self.registry.deliver(&signal.to, payload.into());
        crate::metrics::record_call_signal(action.as_str());
        debug!(action = %action, from = %from, to = %signal.to, outcome = ?outcome, "Relayed call signal");
        Ok(outcome)
    }
}
