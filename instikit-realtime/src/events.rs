//! Realtime event types
//!
//! The fixed set of server topics, the transient event wrapper, and the
//! typed local update dispatched through the hub.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Raw frame as the push server sends it
#[derive(Debug, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// The topics the push server emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerTopic {
    DownloadsCreated,
    AttendanceChanged,
    MarksAdded,
    MarksPublished,
    MarksUpdated,
    NotificationCreated,
    NotificationRead,
}

impl ServerTopic {
    /// Parse a wire topic name. Unknown names are dropped by the bridge.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "downloads:created" => Some(Self::DownloadsCreated),
            "attendance:changed" => Some(Self::AttendanceChanged),
            "marks:added" => Some(Self::MarksAdded),
            "marks:published" => Some(Self::MarksPublished),
            "marks:updated" => Some(Self::MarksUpdated),
            "notification:created" => Some(Self::NotificationCreated),
            "notification:read" => Some(Self::NotificationRead),
            _ => None,
        }
    }

    /// Generic, user-facing description for the ambient notification.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::DownloadsCreated => "New study material is available",
            Self::AttendanceChanged => "An attendance record changed",
            Self::MarksAdded => "New marks were entered",
            Self::MarksPublished => "A marks sheet was published",
            Self::MarksUpdated => "A marks entry was updated",
            Self::NotificationCreated => "A new notice arrived",
            Self::NotificationRead => "A notice was marked as read",
        }
    }
}

impl std::fmt::Display for ServerTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DownloadsCreated => "downloads:created",
            Self::AttendanceChanged => "attendance:changed",
            Self::MarksAdded => "marks:added",
            Self::MarksPublished => "marks:published",
            Self::MarksUpdated => "marks:updated",
            Self::NotificationCreated => "notification:created",
            Self::NotificationRead => "notification:read",
        };
        write!(f, "{}", name)
    }
}

/// One received push event. Transient; a hint to refetch, never state.
#[derive(Debug, Clone)]
pub struct RealtimeEvent {
    pub topic: ServerTopic,
    /// Original server payload, passed through opaque
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(topic: ServerTopic, payload: Value) -> Self {
        Self {
            topic,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Ambient notification shown for every push event
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub topic: ServerTopic,
    pub at: DateTime<Utc>,
}

impl Toast {
    pub fn for_topic(topic: ServerTopic) -> Self {
        Self {
            message: topic.describe().to_string(),
            topic,
            at: Utc::now(),
        }
    }
}

/// Typed local update, one variant per local channel. The hub's single
/// publish entry point dispatches on this, so the topic-to-channel mapping
/// is checked at compile time instead of living in event-name strings.
#[derive(Debug, Clone)]
pub enum LocalUpdate {
    Downloads(RealtimeEvent),
    Attendance(RealtimeEvent),
    Marks(RealtimeEvent),
    Notifications(RealtimeEvent),
}

impl LocalUpdate {
    pub fn from_event(event: RealtimeEvent) -> Self {
        match event.topic {
            ServerTopic::DownloadsCreated => Self::Downloads(event),
            ServerTopic::AttendanceChanged => Self::Attendance(event),
            ServerTopic::MarksAdded | ServerTopic::MarksPublished | ServerTopic::MarksUpdated => {
                Self::Marks(event)
            }
            ServerTopic::NotificationCreated | ServerTopic::NotificationRead => {
                Self::Notifications(event)
            }
        }
    }

    pub fn event(&self) -> &RealtimeEvent {
        match self {
            Self::Downloads(event)
            | Self::Attendance(event)
            | Self::Marks(event)
            | Self::Notifications(event) => event,
        }
    }

    /// Local channel name, for logs.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Downloads(_) => "realtime:downloads",
            Self::Attendance(_) => "realtime:attendance",
            Self::Marks(_) => "realtime:marks",
            Self::Notifications(_) => "realtime:notifications",
        }
    }
}
