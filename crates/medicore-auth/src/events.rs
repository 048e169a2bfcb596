//! Account event publishing
//!
//! The gateway and the account-management handlers hand an [`AccountEvent`]
//! to an [`EventPublisher`] after every successful state change. Delivery to
//! clients (activity feeds, notification streams) lives downstream of the
//! publisher. Publishing never fails the originating request.

use chrono::{DateTime, Utc};
use medicore_types::Role;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Account or session state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountEvent {
    Registered {
        account_id: Uuid,
        role: Role,
    },
    LoggedIn {
        account_id: Uuid,
        session_id: Uuid,
        device: String,
    },
    FederatedLogin {
        account_id: Uuid,
        provider: String,
        created: bool,
    },
    SessionRotated {
        account_id: Uuid,
        previous_session_id: Uuid,
        session_id: Uuid,
    },
    LoggedOut {
        account_id: Uuid,
        session_id: Uuid,
    },
    SessionsRevoked {
        account_id: Uuid,
        count: u64,
    },
    PasswordChanged {
        account_id: Uuid,
    },
    AccountUpdated {
        account_id: Uuid,
        actor_id: Uuid,
    },
    AccountDeleted {
        account_id: Uuid,
        actor_id: Uuid,
        permanent: bool,
    },
    AccountRestored {
        account_id: Uuid,
        actor_id: Uuid,
    },
}

impl AccountEvent {
    /// Account the event is about
    pub fn account_id(&self) -> Uuid {
        match self {
            Self::Registered { account_id, .. }
            | Self::LoggedIn { account_id, .. }
            | Self::FederatedLogin { account_id, .. }
            | Self::SessionRotated { account_id, .. }
            | Self::LoggedOut { account_id, .. }
            | Self::SessionsRevoked { account_id, .. }
            | Self::PasswordChanged { account_id }
            | Self::AccountUpdated { account_id, .. }
            | Self::AccountDeleted { account_id, .. }
            | Self::AccountRestored { account_id, .. } => *account_id,
        }
    }
}

/// Event with its emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AccountEvent,
}

/// Sink for account events
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: AccountEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, event: AccountEvent) {
        tracing::trace!(account_id = %event.account_id(), "Event dropped (no publisher)");
    }
}

/// In-process fan-out over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: AccountEvent) {
        let envelope = EventEnvelope {
            at: Utc::now(),
            event,
        };
        // No receivers is not an error
        if self.tx.send(envelope).is_err() {
            tracing::trace!("Event published with no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();
        let account_id = Uuid::new_v4();

        publisher.publish(AccountEvent::PasswordChanged { account_id });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event.account_id(), account_id);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = BroadcastPublisher::new(8);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish(AccountEvent::PasswordChanged {
            account_id: Uuid::new_v4(),
        });
    }

    #[test]
    fn test_event_wire_format() {
        let event = AccountEvent::AccountDeleted {
            account_id: Uuid::nil(),
            actor_id: Uuid::nil(),
            permanent: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "account_deleted");
        assert_eq!(json["permanent"], false);
    }
}
