//! Payment lifecycle events and the observer hooks that receive them.
//!
//! Hooks are plain synchronous closures. They are called inline on the task running the
//! payment flow and must not call back into the client.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What happened.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    /// The server demanded payment and the client is about to pay
    Attempt,
    /// The server confirmed settlement
    Success,
    /// The payment flow failed
    Failure,
    /// A signer is being tried
    SignerAttempt,
    /// A signer produced a payload
    SignerSuccess,
    /// A signer could not pay
    SignerFailure,
}

impl fmt::Display for PaymentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Attempt => "attempt",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::SignerAttempt => "signer_attempt",
            Self::SignerSuccess => "signer_success",
            Self::SignerFailure => "signer_failure",
        };
        f.write_str(name)
    }
}

/// A payment lifecycle event.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    /// Event type
    #[serde(rename = "type")]
    pub kind: PaymentEventKind,

    /// Amount in the asset's smallest unit, when known
    pub amount: Option<String>,

    /// Network, when known
    pub network: Option<String>,

    /// Asset, when known
    pub asset: Option<String>,

    /// Recipient, when known
    pub recipient: Option<String>,

    /// Resource being paid for
    pub resource: Option<String>,

    /// Index of the signer in the fallback list
    pub signer_index: Option<usize>,

    /// Priority of the signer
    pub signer_priority: Option<i32>,

    /// Address of the signer
    pub signer_address: Option<String>,

    /// Error description for failure events
    pub error: Option<String>,

    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

impl PaymentEvent {
    /// Creates an event of `kind` stamped with the current time.
    pub fn new(kind: PaymentEventKind) -> Self {
        Self {
            kind,
            amount: None,
            network: None,
            asset: None,
            recipient: None,
            resource: None,
            signer_index: None,
            signer_priority: None,
            signer_address: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Fills in the payment fields from a requirement.
    pub fn for_requirement(mut self, requirement: &crate::types::PaymentRequirements) -> Self {
        self.amount = Some(requirement.max_amount_required.clone());
        self.network = Some(requirement.network.clone());
        self.asset = Some(requirement.asset.clone());
        self.recipient = Some(requirement.pay_to.clone());
        self.resource = Some(requirement.resource.clone());
        self
    }

    /// Fills in the signer fields.
    pub fn for_signer(mut self, index: usize, priority: i32, address: impl Into<String>) -> Self {
        self.signer_index = Some(index);
        self.signer_priority = Some(priority);
        self.signer_address = Some(address.into());
        self
    }

    /// Sets the error description.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Observer callback.
pub type EventCallback = Arc<dyn Fn(&PaymentEvent) + Send + Sync>;

/// Per-kind lifecycle observers. Unset hooks are skipped.
#[derive(Clone, Default)]
pub struct PaymentHooks {
    on_attempt: Option<EventCallback>,
    on_success: Option<EventCallback>,
    on_failure: Option<EventCallback>,
    on_signer_attempt: Option<EventCallback>,
    on_signer_success: Option<EventCallback>,
    on_signer_failure: Option<EventCallback>,
}

impl PaymentHooks {
    /// Creates an empty set of hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for events of `kind`, replacing any previous one.
    pub fn on(
        mut self,
        kind: PaymentEventKind,
        callback: impl Fn(&PaymentEvent) + Send + Sync + 'static,
    ) -> Self {
        let callback: EventCallback = Arc::new(callback);
        let slot = match kind {
            PaymentEventKind::Attempt => &mut self.on_attempt,
            PaymentEventKind::Success => &mut self.on_success,
            PaymentEventKind::Failure => &mut self.on_failure,
            PaymentEventKind::SignerAttempt => &mut self.on_signer_attempt,
            PaymentEventKind::SignerSuccess => &mut self.on_signer_success,
            PaymentEventKind::SignerFailure => &mut self.on_signer_failure,
        };
        *slot = Some(callback);
        self
    }

    /// Registers `callback` for every kind of event.
    pub fn on_all(self, callback: impl Fn(&PaymentEvent) + Send + Sync + 'static) -> Self {
        let callback: EventCallback = Arc::new(callback);
        let mut hooks = self;
        for kind in [
            PaymentEventKind::Attempt,
            PaymentEventKind::Success,
            PaymentEventKind::Failure,
            PaymentEventKind::SignerAttempt,
            PaymentEventKind::SignerSuccess,
            PaymentEventKind::SignerFailure,
        ] {
            let callback = callback.clone();
            hooks = hooks.on(kind, move |event| callback(event));
        }
        hooks
    }

    /// Delivers `event` to the hook registered for its kind.
    pub fn emit(&self, event: PaymentEvent) {
        debug!(
            kind = %event.kind,
            amount = ?event.amount,
            network = ?event.network,
            signer = ?event.signer_index,
            error = ?event.error,
            "payment event"
        );

        let hook = match event.kind {
            PaymentEventKind::Attempt => &self.on_attempt,
            PaymentEventKind::Success => &self.on_success,
            PaymentEventKind::Failure => &self.on_failure,
            PaymentEventKind::SignerAttempt => &self.on_signer_attempt,
            PaymentEventKind::SignerSuccess => &self.on_signer_success,
            PaymentEventKind::SignerFailure => &self.on_signer_failure,
        };
        if let Some(hook) = hook {
            hook(&event);
        }
    }
}

impl fmt::Debug for PaymentHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentHooks")
            .field("on_attempt", &self.on_attempt.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_signer_attempt", &self.on_signer_attempt.is_some())
            .field("on_signer_success", &self.on_signer_success.is_some())
            .field("on_signer_failure", &self.on_signer_failure.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_routes_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hooks = PaymentHooks::new().on(PaymentEventKind::Success, move |e| {
            sink.lock().unwrap().push(e.kind);
        });

        hooks.emit(PaymentEvent::new(PaymentEventKind::Attempt));
        hooks.emit(PaymentEvent::new(PaymentEventKind::Success));

        assert_eq!(*seen.lock().unwrap(), vec![PaymentEventKind::Success]);
    }

    #[test]
    fn test_on_all() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hooks = PaymentHooks::new().on_all(move |e| sink.lock().unwrap().push(e.kind));

        hooks.emit(PaymentEvent::new(PaymentEventKind::SignerAttempt));
        hooks.emit(PaymentEvent::new(PaymentEventKind::SignerFailure));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PaymentEventKind::SignerAttempt, PaymentEventKind::SignerFailure]
        );
    }

    #[test]
    fn test_event_serializes_type_field() {
        let event = PaymentEvent::new(PaymentEventKind::SignerSuccess).for_signer(1, 2, "0xabc");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "signer_success");
        assert_eq!(value["signerIndex"], 1);
        assert_eq!(value["signerAddress"], "0xabc");
    }
}
