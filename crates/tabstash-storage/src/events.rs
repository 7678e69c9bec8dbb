//! Change notification
//!
//! Mutating operations publish a best-effort event once their transaction has
//! committed. Publishing never fails: with nobody listening the event is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeEvent {
    TabsChanged,
    CustomGroupsChanged,
    TrashChanged,
    SettingsChanged,
}

impl ChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeEvent::TabsChanged => "tabs-changed",
            ChangeEvent::CustomGroupsChanged => "custom-groups-changed",
            ChangeEvent::TrashChanged => "trash-changed",
            ChangeEvent::SettingsChanged => "settings-changed",
        }
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to whoever is listening.
    pub fn notify(&self, event: ChangeEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!(event = %event, "No listener for change event");
        }
    }

    pub fn notify_all(&self, events: &[ChangeEvent]) {
        for event in events {
            self.notify(*event);
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_listener_is_silent() {
        let notifier = ChangeNotifier::new();
        notifier.notify(ChangeEvent::TabsChanged);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();

        notifier.notify_all(&[ChangeEvent::TabsChanged, ChangeEvent::TrashChanged]);

        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::TabsChanged);
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::TrashChanged);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            serde_json::to_string(&ChangeEvent::CustomGroupsChanged).unwrap(),
            "\"custom-groups-changed\""
        );
        assert_eq!(ChangeEvent::SettingsChanged.to_string(), "settings-changed");
    }
}
