//! Local pub/sub hub
//!
//! One broadcast channel per local topic plus the toast stream. The hub
//! owns no knowledge of who is listening; whichever module is currently
//! interested subscribes and drops its receiver when done. Send failures
//! mean nobody is subscribed, which is fine.

use crate::events::{LocalUpdate, RealtimeEvent, Toast};
use tokio::sync::broadcast;
use tracing::debug;

/// Fan-out point between the realtime bridge and UI-owned refresh logic
pub struct EventHub {
    downloads: broadcast::Sender<RealtimeEvent>,
    attendance: broadcast::Sender<RealtimeEvent>,
    marks: broadcast::Sender<RealtimeEvent>,
    notifications: broadcast::Sender<RealtimeEvent>,
    toasts: broadcast::Sender<Toast>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (downloads, _) = broadcast::channel(capacity);
        let (attendance, _) = broadcast::channel(capacity);
        let (marks, _) = broadcast::channel(capacity);
        let (notifications, _) = broadcast::channel(capacity);
        let (toasts, _) = broadcast::channel(capacity);
        Self {
            downloads,
            attendance,
            marks,
            notifications,
            toasts,
        }
    }

    /// The single dispatch point for refresh hints.
    pub fn publish(&self, update: LocalUpdate) {
        debug!(channel = update.channel(), topic = %update.event().topic, "republishing event");
        let _ = match update {
            LocalUpdate::Downloads(event) => self.downloads.send(event),
            LocalUpdate::Attendance(event) => self.attendance.send(event),
            LocalUpdate::Marks(event) => self.marks.send(event),
            LocalUpdate::Notifications(event) => self.notifications.send(event),
        };
    }

    /// Emit an ambient notification.
    pub fn notify(&self, toast: Toast) {
        let _ = self.toasts.send(toast);
    }

    pub fn subscribe_downloads(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.downloads.subscribe()
    }

    pub fn subscribe_attendance(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.attendance.subscribe()
    }

    pub fn subscribe_marks(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.marks.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.notifications.subscribe()
    }

    pub fn subscribe_toasts(&self) -> broadcast::Receiver<Toast> {
        self.toasts.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ServerTopic;
    use serde_json::json;

    #[tokio::test]
    async fn publish_reaches_only_the_matching_channel() {
        let hub = EventHub::default();
        let mut marks = hub.subscribe_marks();
        let mut attendance = hub.subscribe_attendance();

        hub.publish(LocalUpdate::from_event(RealtimeEvent::new(
            ServerTopic::MarksAdded,
            json!({ "subject": "Anatomy" }),
        )));

        let hint = marks.recv().await.unwrap();
        assert_eq!(hint.payload["subject"], json!("Anatomy"));
        assert!(attendance.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_harmless() {
        let hub = EventHub::default();
        hub.publish(LocalUpdate::from_event(RealtimeEvent::new(
            ServerTopic::DownloadsCreated,
            json!({}),
        )));
        hub.notify(Toast::for_topic(ServerTopic::DownloadsCreated));
    }

    #[tokio::test]
    async fn toasts_flow_on_their_own_stream() {
        let hub = EventHub::default();
        let mut toasts = hub.subscribe_toasts();

        hub.notify(Toast::for_topic(ServerTopic::NotificationCreated));
        let toast = toasts.recv().await.unwrap();
        assert_eq!(toast.topic, ServerTopic::NotificationCreated);
        assert!(!toast.message.is_empty());
    }
}
