//! In-memory lane conversations, restored from and persisted to a [`HistoryStore`].
//!
//! Each lane's conversation sits behind its own async mutex. A request holds
//! the guard for its whole lifetime, so two requests for the same lane run
//! one after the other while different lanes proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use dispatch_core::{Conversation, HistoryStore, Lane, Role};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

pub struct ConversationStore {
    history: Arc<dyn HistoryStore>,
    lanes: RwLock<HashMap<Lane, Arc<Mutex<Conversation>>>>,
    cap: usize,
}

impl ConversationStore {
    /// An empty store. Lanes start empty until first used.
    pub fn new(history: Arc<dyn HistoryStore>, cap: usize) -> Self {
        Self {
            history,
            lanes: RwLock::new(HashMap::new()),
            cap,
        }
    }

    /// A store with every lane restored from history.
    pub async fn restore(history: Arc<dyn HistoryStore>, cap: usize) -> Self {
        let store = Self::new(history, cap);
        {
            let mut lanes = store.lanes.write().await;
            for lane in Lane::ALL {
                let mut conversation = Conversation::from_messages(store.history.load(lane).await);
                conversation.cap(cap);
                debug!(lane = %lane, messages = conversation.len(), "Conversation restored");
                lanes.insert(lane, Arc::new(Mutex::new(conversation)));
            }
        }
        store
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    async fn slot(&self, lane: Lane) -> Arc<Mutex<Conversation>> {
        if let Some(slot) = self.lanes.read().await.get(&lane) {
            return slot.clone();
        }
        self.lanes.write().await.entry(lane).or_default().clone()
    }

    /// Exclusive access to a lane's conversation until the guard drops.
    pub async fn lock(&self, lane: Lane) -> OwnedMutexGuard<Conversation> {
        self.slot(lane).await.lock_owned().await
    }

    /// Cap and save a conversation. Failures are logged and swallowed:
    /// history is best-effort and never blocks a response.
    pub async fn persist(&self, lane: Lane, conversation: &mut Conversation) -> bool {
        conversation.cap(self.cap);
        match self.history.save(lane, &conversation.messages).await {
            Ok(()) => true,
            Err(e) => {
                warn!(lane = %lane, error = %e, "History save failed");
                false
            }
        }
    }

    /// Plain text turns for display; tool turns are filtered out.
    pub async fn display(&self, lane: Lane) -> Vec<(Role, String)> {
        self.lock(lane).await.display_turns()
    }

    /// Reset a lane to empty and persist the empty state.
    pub async fn clear(&self, lane: Lane) -> bool {
        let mut conversation = self.lock(lane).await;
        conversation.clear();
        self.persist(lane, &mut conversation).await
    }
}
