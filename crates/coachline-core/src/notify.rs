//! Outbound notifications to the other party of a workflow step.
//!
//! Delivery happens after the triggering write has committed. A failed
//! delivery never undoes the write; callers log it and report a degraded
//! success.

use async_trait::async_trait;
use uuid::Uuid;

use coachline_db::models::RequestStatus;

/// Something a party should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    RequestReceived {
        request_id: Uuid,
        trainer_id: Uuid,
        client_id: Uuid,
    },
    RequestDecided {
        request_id: Uuid,
        client_id: Uuid,
        status: RequestStatus,
    },
    PlanAssigned {
        assigned_plan_id: Uuid,
        client_id: Uuid,
    },
}

impl Notification {
    /// The user the notification is addressed to.
    pub fn recipient(&self) -> Uuid {
        match self {
            Self::RequestReceived { trainer_id, .. } => *trainer_id,
            Self::RequestDecided { client_id, .. } | Self::PlanAssigned { client_id, .. } => {
                *client_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestReceived { .. } => "request_received",
            Self::RequestDecided { .. } => "request_decided",
            Self::PlanAssigned { .. } => "plan_assigned",
        }
    }
}

/// Delivery channel for notifications (email, push, chat).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Records notifications as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            kind = notification.kind(),
            recipient = %notification.recipient(),
            ?notification,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Deliver `notification`, logging instead of failing. Returns `false` when
/// delivery failed so the caller can flag a degraded success.
pub async fn deliver(notifier: &dyn Notifier, notification: Notification) -> bool {
    match notifier.notify(&notification).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                kind = notification.kind(),
                recipient = %notification.recipient(),
                error = ?e,
                "notification delivery failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: &Notification) -> anyhow::Result<()> {
            anyhow::bail!("smtp unreachable")
        }
    }

    fn received() -> Notification {
        Notification::RequestReceived {
            request_id: Uuid::new_v4(),
            trainer_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn recipient_is_the_other_party() {
        let trainer_id = Uuid::new_v4();
        let client_id = Uuid::new_v4();
        let received = Notification::RequestReceived {
            request_id: Uuid::new_v4(),
            trainer_id,
            client_id,
        };
        assert_eq!(received.recipient(), trainer_id);

        let decided = Notification::RequestDecided {
            request_id: Uuid::new_v4(),
            client_id,
            status: RequestStatus::Accepted,
        };
        assert_eq!(decided.recipient(), client_id);
    }

    #[tokio::test]
    async fn deliver_reports_success() {
        assert!(deliver(&LogNotifier, received()).await);
    }

    #[tokio::test]
    async fn deliver_swallows_failures() {
        assert!(!deliver(&FailingNotifier, received()).await);
    }
}
