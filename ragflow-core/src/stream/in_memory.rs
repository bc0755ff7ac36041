//! Process-local [`StreamManager`], used when a single replica is deployed.
//!
//! Grounded on the `Mutex`-guarded append pattern used elsewhere in this
//! codebase for small, hot, short-lived collections (one per in-flight
//! request rather than one per process).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ResponseType, StreamEvent, StreamManager};
use crate::error::CoreError;

struct Slot {
    events: Vec<StreamEvent>,
    terminal: bool,
    terminal_at: Option<Instant>,
    created_at: Instant,
}

impl Slot {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            terminal: false,
            terminal_at: None,
            created_at: Instant::now(),
        }
    }
}

/// In-memory stream manager with a default one-hour TTL per slot, matching
/// the external-log default so callers see identical expiry behavior
/// regardless of backend.
pub struct InMemoryStreamManager {
    slots: Mutex<HashMap<(String, String), Slot>>,
    ttl: Duration,
}

impl Default for InMemoryStreamManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl InMemoryStreamManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn shared(ttl: Duration) -> Arc<Self> {
        Arc::new(Self::new(ttl))
    }

    fn expired(&self, slot: &Slot) -> bool {
        let since = slot.terminal_at.unwrap_or(slot.created_at);
        since.elapsed() > self.ttl
    }
}

#[async_trait]
impl StreamManager for InMemoryStreamManager {
    async fn append_event(
        &self,
        session_id: &str,
        message_id: &str,
        event: StreamEvent,
    ) -> Result<(), CoreError> {
        let mut slots = self.slots.lock().await;
        let key = (session_id.to_string(), message_id.to_string());
        let slot = slots.entry(key).or_insert_with(Slot::new);

        if self.expired(slot) {
            return Err(CoreError::NotFound(format!(
                "stream slot expired: {session_id}/{message_id}"
            )));
        }

        // A complete event is terminal except for a late session_title.
        if slot.terminal && event.response_type != ResponseType::SessionTitle {
            return Err(CoreError::Conflict(
                "stream slot already terminated".to_string(),
            ));
        }

        if event.response_type == ResponseType::Complete && event.done {
            slot.terminal = true;
            slot.terminal_at = Some(Instant::now());
        }
        slot.events.push(event);
        Ok(())
    }

    async fn get_events(
        &self,
        session_id: &str,
        message_id: &str,
        from_offset: u64,
    ) -> Result<(Vec<StreamEvent>, u64), CoreError> {
        let mut slots = self.slots.lock().await;
        let key = (session_id.to_string(), message_id.to_string());
        let Some(slot) = slots.get(&key) else {
            return Err(CoreError::NotFound(format!(
                "stream slot not found: {session_id}/{message_id}"
            )));
        };
        if self.expired(slot) {
            slots.remove(&key);
            return Err(CoreError::NotFound(format!(
                "stream slot expired: {session_id}/{message_id}"
            )));
        }
        let from = from_offset as usize;
        let events = slot.events.get(from..).unwrap_or_default().to_vec();
        Ok((events, slot.events.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(rt: ResponseType, done: bool) -> StreamEvent {
        StreamEvent::new("e", rt).with_done(done)
    }

    #[tokio::test]
    async fn offsets_are_dense_and_increasing() {
        let mgr = InMemoryStreamManager::default();
        mgr.append_event("s1", "m1", event(ResponseType::Thinking, false)).await.unwrap();
        mgr.append_event("s1", "m1", event(ResponseType::Answer, false)).await.unwrap();
        let (events, offset) = mgr.get_events("s1", "m1", 0).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(offset, 2);
    }

    #[tokio::test]
    async fn replay_concatenation_matches_full_replay() {
        let mgr = InMemoryStreamManager::default();
        for _ in 0..5 {
            mgr.append_event("s1", "m1", event(ResponseType::Answer, false)).await.unwrap();
        }
        let (full, full_offset) = mgr.get_events("s1", "m1", 0).await.unwrap();
        let (first_part, _) = mgr.get_events("s1", "m1", 0).await.unwrap();
        let (second_part, end_offset) = mgr.get_events("s1", "m1", 3).await.unwrap();
        let mut concatenated = first_part[..3].to_vec();
        concatenated.extend(second_part);
        assert_eq!(concatenated.len(), full.len());
        assert_eq!(end_offset, full_offset);
    }

    #[tokio::test]
    async fn complete_event_is_terminal_for_non_session_title_appends() {
        let mgr = InMemoryStreamManager::default();
        mgr.append_event("s1", "m1", event(ResponseType::Complete, true)).await.unwrap();
        let err = mgr
            .append_event("s1", "m1", event(ResponseType::Answer, false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn session_title_may_follow_complete() {
        let mgr = InMemoryStreamManager::default();
        mgr.append_event("s1", "m1", event(ResponseType::Complete, true)).await.unwrap();
        mgr.append_event("s1", "m1", event(ResponseType::SessionTitle, true)).await.unwrap();
        let (events, _) = mgr.get_events("s1", "m1", 0).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn reading_unknown_slot_returns_not_found() {
        let mgr = InMemoryStreamManager::default();
        let err = mgr.get_events("nope", "nope", 0).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_poll_returns_empty_slice_same_offset() {
        let mgr = InMemoryStreamManager::default();
        mgr.append_event("s1", "m1", event(ResponseType::Answer, false)).await.unwrap();
        let (events, offset) = mgr.get_events("s1", "m1", 1).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(offset, 1);
    }

    #[tokio::test]
    async fn expired_slot_is_not_found_on_read() {
        let mgr = InMemoryStreamManager::new(Duration::from_millis(1));
        mgr.append_event("s1", "m1", event(ResponseType::Answer, false)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = mgr.get_events("s1", "m1", 0).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
