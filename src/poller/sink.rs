use tokio::sync::mpsc;

use crate::models::Notification;

/// Downstream consumer of normalized notifications.
///
/// Delivery must not block; failures past this point belong to the sink.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn deliver(&self, notification: Notification) {
        self(notification)
    }
}

/// Sink that forwards into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, notification: Notification) {
        if let Err(mpsc::error::SendError(dropped)) = self.tx.send(notification) {
            tracing::debug!(id = %dropped.id(), "Notification receiver closed, dropping notification");
        }
    }
}
