use async_trait::async_trait;

use alsat_shared::clients::rabbitmq::RabbitMQClient;
use alsat_shared::types::event::payloads::OwnerNotice;
use alsat_shared::types::event::{routing_keys, Event};

#[derive(Debug, thiserror::Error)]
pub enum OwnerNotifyError {
    #[error("owner notice could not be published: {0}")]
    Publish(#[from] lapin::Error),

    #[error("{0}")]
    Other(String),
}

/// Out-of-band channel to the site owner.
///
/// `Ok(false)` means the notice was not delivered for an ordinary reason;
/// callers log it and move on. `Err` is reserved for unexpected failures.
#[async_trait]
pub trait OwnerNotifier: Send + Sync {
    async fn notify(&self, notice: &OwnerNotice) -> Result<bool, OwnerNotifyError>;
}

#[derive(Debug, Default, Clone)]
pub struct LogOwnerNotifier;

#[async_trait]
impl OwnerNotifier for LogOwnerNotifier {
    async fn notify(&self, notice: &OwnerNotice) -> Result<bool, OwnerNotifyError> {
        tracing::info!(title = %notice.title, message = %notice.message, "owner notice");
        Ok(true)
    }
}

/// Publishes notices as events on the message bus.
#[derive(Clone)]
pub struct EventOwnerNotifier {
    rabbitmq: RabbitMQClient,
    source: String,
}

impl EventOwnerNotifier {
    pub fn new(rabbitmq: RabbitMQClient, source: impl Into<String>) -> Self {
        Self { rabbitmq, source: source.into() }
    }
}

pub fn routing_key_for(notice: &OwnerNotice) -> &'static str {
    if notice.title.ends_with("Failed") {
        routing_keys::NOTIFICATIONS_JOB_FAILED
    } else {
        routing_keys::NOTIFICATIONS_JOB_COMPLETED
    }
}

#[async_trait]
impl OwnerNotifier for EventOwnerNotifier {
    async fn notify(&self, notice: &OwnerNotice) -> Result<bool, OwnerNotifyError> {
        let routing_key = routing_key_for(notice);
        let event = Event::new(self.source.clone(), routing_key, notice.clone());

        match self.rabbitmq.publish(routing_key, &event).await {
            Ok(()) => Ok(true),
            // Closed channels happen on broker restarts.
            Err(lapin::Error::InvalidChannelState(state)) => {
                tracing::warn!(?state, routing_key, "owner notice dropped, channel not usable");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
