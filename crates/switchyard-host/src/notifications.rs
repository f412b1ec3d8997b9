//! Toast notifications for broker updates.
//!
//! Structured messages carrying a `status` render as
//! `Shipment {trackingId} is now {status}`; everything else renders as the
//! raw body. Notifications stay visible for [`NOTIFICATION_TTL`].

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;
use switchyard_bus::BusMessage;

/// How long a notification stays in the feed.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(6);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentUpdate {
    #[serde(default)]
    tracking_id: Option<serde_json::Value>,
    status: String,
}

/// Text shown for one broker message.
pub fn render(message: &BusMessage) -> String {
    if message.discriminator().is_none_or(str::is_empty) {
        return message.text().to_string();
    }
    match message.decode::<ShipmentUpdate>() {
        Ok(update) => {
            let tracking = match update.tracking_id {
                Some(serde_json::Value::String(id)) => id,
                Some(serde_json::Value::Null) | None => "undefined".to_string(),
                Some(other) => other.to_string(),
            };
            format!("Shipment {tracking} is now {}", update.status)
        }
        Err(_) => message.text().to_string(),
    }
}

/// One rendered notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Topic the update arrived on.
    pub topic: String,
    /// Rendered text.
    pub text: String,
}

impl Notification {
    /// Render `message`.
    pub fn from_message(message: &BusMessage) -> Self {
        Self {
            topic: message.topic().to_string(),
            text: render(message),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Update: {}", self.text)
    }
}

/// Notifications currently on screen, oldest first.
#[derive(Debug)]
pub struct NotificationFeed {
    ttl: Duration,
    entries: Mutex<VecDeque<(Instant, Notification)>>,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new(NOTIFICATION_TTL)
    }
}

impl NotificationFeed {
    /// Feed whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Add a notification shown from now.
    pub fn push(&self, notification: Notification) {
        self.push_at(Instant::now(), notification);
    }

    /// Add a notification shown from `at`.
    pub fn push_at(&self, at: Instant, notification: Notification) {
        self.entries.lock().push_back((at, notification));
    }

    /// Notifications still visible now.
    pub fn active(&self) -> Vec<Notification> {
        self.active_at(Instant::now())
    }

    /// Notifications still visible at `now`; expired entries are dropped.
    pub fn active_at(&self, now: Instant) -> Vec<Notification> {
        let mut entries = self.entries.lock();
        while entries
            .front()
            .is_some_and(|(shown, _)| now.saturating_duration_since(*shown) >= self.ttl)
        {
            let _ = entries.pop_front();
        }
        entries.iter().map(|(_, n)| n.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "/topic/shipments";

    #[test]
    fn status_update_renders_sentence() {
        let msg = BusMessage::new(TOPIC, r#"{"trackingId":"TRK-1001","status":"IN_TRANSIT"}"#);
        assert_eq!(render(&msg), "Shipment TRK-1001 is now IN_TRANSIT");
    }

    #[test]
    fn missing_status_renders_raw_json() {
        let body = r#"{"trackingId":"TRK-1001"}"#;
        assert_eq!(render(&BusMessage::new(TOPIC, body)), body);

        let body = r#"{"trackingId":"TRK-1001","status":""}"#;
        assert_eq!(render(&BusMessage::new(TOPIC, body)), body);
    }

    #[test]
    fn plain_text_renders_raw() {
        let msg = BusMessage::new(TOPIC, "Vehicle AB-123 departed");
        assert_eq!(render(&msg), "Vehicle AB-123 departed");
    }

    #[test]
    fn missing_tracking_id() {
        let msg = BusMessage::new(TOPIC, r#"{"status":"DELIVERED"}"#);
        assert_eq!(render(&msg), "Shipment undefined is now DELIVERED");

        let msg = BusMessage::new(TOPIC, r#"{"trackingId":42,"status":"DELIVERED"}"#);
        assert_eq!(render(&msg), "Shipment 42 is now DELIVERED");
    }

    #[test]
    fn display_prefix() {
        let n = Notification::from_message(&BusMessage::new(TOPIC, "hello"));
        assert_eq!(n.topic, TOPIC);
        assert_eq!(n.to_string(), "Update: hello");
    }

    #[test]
    fn feed_expires_oldest_first() {
        let feed = NotificationFeed::new(Duration::from_secs(6));
        let start = Instant::now();
        let note = |text: &str| Notification {
            topic: TOPIC.into(),
            text: text.into(),
        };
        feed.push_at(start, note("first"));
        feed.push_at(start + Duration::from_secs(2), note("second"));

        assert_eq!(feed.active_at(start + Duration::from_secs(1)).len(), 2);

        let later = feed.active_at(start + Duration::from_secs(6));
        assert_eq!(later, vec![note("second")]);

        assert!(feed.active_at(start + Duration::from_secs(9)).is_empty());
    }
}
