use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use notification_cell::{PushEvent, RefreshSink};

use crate::models::{ChatEntry, ChatError, ChatMessage, DeliveryStatus};

/// Messages between the signed-in user and one peer, oldest first.
///
/// Sent messages show up at once as pending entries. The server copy replaces
/// them on confirmation, and pushed or re-fetched messages are merged by
/// server id so nothing is shown twice.
#[derive(Debug, Clone)]
pub struct ChatThread {
    owner_id: String,
    peer_id: String,
    entries: Vec<ChatEntry>,
}

impl ChatThread {
    pub fn new(owner_id: impl Into<String>, peer_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            peer_id: peer_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == DeliveryStatus::Pending)
            .count()
    }

    pub fn push_pending(&mut self, text: &str, now: DateTime<Utc>) -> Uuid {
        let local_id = Uuid::new_v4();
        self.entries.push(ChatEntry {
            local_id,
            status: DeliveryStatus::Pending,
            message: ChatMessage {
                id: None,
                sender_id: self.owner_id.clone(),
                receiver_id: self.peer_id.clone(),
                message: text.trim().to_string(),
                created_at: Some(now),
            },
        });
        self.sort();
        local_id
    }

    pub fn confirm(&mut self, local_id: Uuid, mut confirmed: ChatMessage) -> Result<(), ChatError> {
        let index = self.position(local_id)?;

        // The push may have delivered the server copy before the send returned.
        let already_merged = confirmed
            .id
            .as_deref()
            .is_some_and(|id| self.contains_id(id));
        if already_merged {
            self.entries.remove(index);
            return Ok(());
        }

        let entry = &mut self.entries[index];
        if confirmed.created_at.is_none() {
            confirmed.created_at = entry.message.created_at;
        }
        entry.message = confirmed;
        entry.status = DeliveryStatus::Sent;
        self.sort();
        Ok(())
    }

    pub fn fail(&mut self, local_id: Uuid) -> Result<(), ChatError> {
        let index = self.position(local_id)?;
        self.entries[index].status = DeliveryStatus::Failed;
        Ok(())
    }

    /// Add a message from the server unless it is already shown or belongs
    /// to another conversation. Returns whether the thread changed.
    pub fn merge(&mut self, message: ChatMessage) -> bool {
        if !message.is_between(&self.owner_id, &self.peer_id) {
            return false;
        }

        let duplicate = match message.id.as_deref() {
            Some(id) => self.contains_id(id),
            None => self
                .entries
                .iter()
                .any(|e| e.status == DeliveryStatus::Sent && e.message == message),
        };
        if duplicate {
            return false;
        }

        self.entries.push(ChatEntry {
            local_id: Uuid::new_v4(),
            status: DeliveryStatus::Sent,
            message,
        });
        self.sort();
        true
    }

    /// Swap in a fresh history. Unconfirmed messages stay, and so do pushed
    /// messages newer than anything the history returned.
    pub fn replace_history(&mut self, history: Vec<ChatMessage>) {
        let newest = history.iter().filter_map(|m| m.created_at).max();
        let kept: Vec<ChatEntry> = self
            .entries
            .drain(..)
            .filter(|e| e.status != DeliveryStatus::Sent || Self::arrived_after(e, newest))
            .collect();

        for message in history {
            self.merge(message);
        }
        for entry in kept {
            let duplicate = entry.message.id.as_deref().is_some_and(|id| self.contains_id(id));
            if !duplicate {
                self.entries.push(entry);
            }
        }
        self.sort();
    }

    fn arrived_after(entry: &ChatEntry, newest: Option<DateTime<Utc>>) -> bool {
        match (entry.message.created_at, newest) {
            (Some(at), Some(newest)) => at > newest,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn position(&self, local_id: Uuid) -> Result<usize, ChatError> {
        self.entries
            .iter()
            .position(|e| e.local_id == local_id)
            .ok_or(ChatError::UnknownLocalId(local_id))
    }

    fn contains_id(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.message.id.as_deref() == Some(id))
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.message.created_at.cmp(&b.message.created_at));
    }
}

struct OpenThread {
    thread: ChatThread,
    touched: Instant,
}

type ThreadKey = (String, String);

/// Open chat threads, keyed by (owner, peer).
///
/// A thread stays open until its owner closes it or leaves it untouched for
/// `idle_timeout`.
pub struct ChatThreads {
    threads: Mutex<HashMap<ThreadKey, OpenThread>>,
    idle_timeout: Duration,
}

impl ChatThreads {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn open_threads(&self) -> MutexGuard<'_, HashMap<ThreadKey, OpenThread>> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` on the thread, opening it first if needed.
    pub fn with_thread<R>(&self, owner_id: &str, peer_id: &str, f: impl FnOnce(&mut ChatThread) -> R) -> R {
        self.with_thread_at(owner_id, peer_id, Instant::now(), f)
    }

    pub(crate) fn with_thread_at<R>(
        &self,
        owner_id: &str,
        peer_id: &str,
        now: Instant,
        f: impl FnOnce(&mut ChatThread) -> R,
    ) -> R {
        let mut threads = self.open_threads();
        let before = threads.len();
        threads.retain(|_, open| now.saturating_duration_since(open.touched) < self.idle_timeout);
        if threads.len() < before {
            debug!("Closed {} idle chat threads", before - threads.len());
        }

        let open = threads
            .entry((owner_id.to_string(), peer_id.to_string()))
            .or_insert_with(|| OpenThread {
                thread: ChatThread::new(owner_id, peer_id),
                touched: now,
            });
        open.touched = now;
        f(&mut open.thread)
    }

    pub fn snapshot(&self, owner_id: &str, peer_id: &str) -> Option<Vec<ChatEntry>> {
        let mut threads = self.open_threads();
        let open = threads.get_mut(&(owner_id.to_string(), peer_id.to_string()))?;
        open.touched = Instant::now();
        Some(open.thread.entries().to_vec())
    }

    pub fn close(&self, owner_id: &str, peer_id: &str) -> bool {
        self.open_threads()
            .remove(&(owner_id.to_string(), peer_id.to_string()))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.open_threads().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RefreshSink for ChatThreads {
    fn on_event(&self, event: &PushEvent) {
        let PushEvent::NewChatMessage(push) = event else {
            return;
        };

        let message = match ChatMessage::try_from(push) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring chat push: {}", e);
                return;
            }
        };

        let mut threads = self.open_threads();
        // Only threads someone has open; the rest load history when opened.
        for key in [
            (message.receiver_id.clone(), message.sender_id.clone()),
            (message.sender_id.clone(), message.receiver_id.clone()),
        ] {
            if let Some(open) = threads.get_mut(&key) {
                if open.thread.merge(message.clone()) {
                    debug!("Merged pushed message into thread {} -> {}", key.0, key.1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use notification_cell::ChatPush;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, minute, 0).unwrap()
    }

    fn server(id: &str, from: &str, to: &str, text: &str, minute: u32) -> ChatMessage {
        ChatMessage {
            id: Some(id.to_string()),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            message: text.to_string(),
            created_at: Some(at(minute)),
        }
    }

    #[test]
    fn pending_message_is_confirmed_in_place() {
        let mut thread = ChatThread::new("p1", "d1");
        let local = thread.push_pending(" Hello ", at(1));
        assert_eq!(thread.pending_count(), 1);
        assert_eq!(thread.entries()[0].message.message, "Hello");

        thread.confirm(local, server("m1", "p1", "d1", "Hello", 1)).unwrap();

        assert_eq!(thread.entries().len(), 1);
        assert_eq!(thread.entries()[0].status, DeliveryStatus::Sent);
        assert_eq!(thread.entries()[0].local_id, local);
        assert_eq!(thread.entries()[0].message.id.as_deref(), Some("m1"));
    }

    #[test]
    fn confirmation_after_push_does_not_duplicate() {
        let mut thread = ChatThread::new("p1", "d1");
        let local = thread.push_pending("Hello", at(1));

        assert!(thread.merge(server("m1", "p1", "d1", "Hello", 1)));
        thread.confirm(local, server("m1", "p1", "d1", "Hello", 1)).unwrap();

        assert_eq!(thread.entries().len(), 1);
        assert_eq!(thread.pending_count(), 0);
    }

    #[test]
    fn failed_send_stays_visible() {
        let mut thread = ChatThread::new("p1", "d1");
        let local = thread.push_pending("Hello", at(1));
        thread.fail(local).unwrap();

        assert_eq!(thread.entries()[0].status, DeliveryStatus::Failed);
        assert_matches!(thread.fail(Uuid::new_v4()), Err(ChatError::UnknownLocalId(_)));
    }

    #[test]
    fn merge_is_idempotent_and_ordered() {
        let mut thread = ChatThread::new("p1", "d1");
        assert!(thread.merge(server("m2", "d1", "p1", "second", 2)));
        assert!(thread.merge(server("m1", "p1", "d1", "first", 1)));
        assert!(!thread.merge(server("m2", "d1", "p1", "second", 2)));
        assert!(!thread.merge(server("m3", "d2", "p1", "other doctor", 3)));

        let texts: Vec<_> = thread.entries().iter().map(|e| e.message.message.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn history_reload_keeps_unconfirmed_messages() {
        let mut thread = ChatThread::new("p1", "d1");
        thread.merge(server("m1", "p1", "d1", "old", 1));
        thread.push_pending("typing...", at(5));

        thread.replace_history(vec![
            server("m1", "p1", "d1", "old", 1),
            server("m2", "d1", "p1", "reply", 3),
        ]);

        let texts: Vec<_> = thread.entries().iter().map(|e| e.message.message.as_str()).collect();
        assert_eq!(texts, ["old", "reply", "typing..."]);
        assert_eq!(thread.pending_count(), 1);
    }

    const IDLE: Duration = Duration::from_secs(1800);

    #[test]
    fn history_reload_keeps_pushed_messages_it_does_not_know_yet() {
        let mut thread = ChatThread::new("p1", "d1");
        thread.merge(server("m1", "p1", "d1", "old", 1));
        thread.merge(server("m3", "d1", "p1", "pushed", 6));

        thread.replace_history(vec![
            server("m1", "p1", "d1", "old", 1),
            server("m2", "d1", "p1", "reply", 3),
        ]);

        let texts: Vec<_> = thread.entries().iter().map(|e| e.message.message.as_str()).collect();
        assert_eq!(texts, ["old", "reply", "pushed"]);

        // Once history catches up the message is not shown twice.
        thread.replace_history(vec![
            server("m1", "p1", "d1", "old", 1),
            server("m2", "d1", "p1", "reply", 3),
            server("m3", "d1", "p1", "pushed", 6),
        ]);
        assert_eq!(thread.entries().len(), 3);
    }

    #[test]
    fn history_reload_drops_messages_the_server_no_longer_has() {
        let mut thread = ChatThread::new("p1", "d1");
        thread.merge(server("m1", "p1", "d1", "old", 1));
        thread.merge(server("gone", "p1", "d1", "removed", 2));

        thread.replace_history(vec![server("m1", "p1", "d1", "old", 1), server("m2", "d1", "p1", "reply", 3)]);

        assert!(thread.entries().iter().all(|e| e.message.id.as_deref() != Some("gone")));
    }

    #[test]
    fn idle_threads_are_closed_on_access() {
        let threads = ChatThreads::new(IDLE);
        let start = Instant::now();
        for i in 0..100 {
            threads.with_thread_at(&format!("p{}", i), "d1", start, |_| ());
        }
        assert_eq!(threads.len(), 100);

        threads.with_thread_at("p0", "d1", start + IDLE, |_| ());

        assert_eq!(threads.len(), 1);
        assert!(threads.close("p0", "d1"));
        assert!(threads.is_empty());
    }

    #[test]
    fn pushed_messages_reach_open_threads_only() {
        let threads = ChatThreads::new(IDLE);
        threads.with_thread("p1", "d1", |_| ());

        let push = ChatPush {
            id: Some("m9".into()),
            from: Some("d1".into()),
            to: Some("p1".into()),
            message: Some("See you".into()),
            created_at: Some(at(4)),
        };
        threads.on_event(&PushEvent::NewChatMessage(push.clone()));
        threads.on_event(&PushEvent::NewChatMessage(push));

        assert_eq!(threads.snapshot("p1", "d1").map(|e| e.len()), Some(1));
        assert!(threads.snapshot("d1", "p1").is_none());
        assert_eq!(threads.len(), 1);
    }
}
