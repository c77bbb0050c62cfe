use std::collections::HashMap;

use crate::bus::InboundEvent;

/// Priority assigned to event ids missing from the configured map.
///
/// Fail-open toward visibility: the device only emits events its
/// event-options policy subscribes to, so an unknown id means the map is
/// stale and the safest move is to surface it, not drop it.
const DEFAULT_PRIORITY: u8 = 1;

/// Maps event ids to operator-configured priority tiers (1 = most urgent,
/// 4 = ignore).
#[derive(Debug, Clone, Default)]
pub struct SeverityClassifier {
    events: HashMap<String, u8>,
}

impl SeverityClassifier {
    pub fn new(events: HashMap<String, u8>) -> Self {
        Self { events }
    }

    pub fn priority(&self, event_id: &str) -> u8 {
        self.events
            .get(event_id)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// Attach a priority to a normalized event.
    pub fn classify(&self, mut event: InboundEvent) -> InboundEvent {
        event.priority = self.priority(&event.event_id);
        event
    }
}
