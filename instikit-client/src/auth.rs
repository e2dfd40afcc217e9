//! Shared credential handle
//!
//! The session store is the only writer; the pipeline and the realtime
//! bridge are readers. Every write bumps the session generation, and
//! outbound requests capture the generation active when they were issued.
//! An expiry report from a superseded generation is ignored, so a stale,
//! late-arriving 401 can never tear down a session established after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Shared authentication state: current bearer token, session generation,
/// and the deduplicated expiry signal.
pub struct AuthHandle {
    token: RwLock<Option<String>>,
    generation: AtomicU64,
    /// Highest generation that has already signalled expiry
    expired_latch: AtomicU64,
    expired_tx: broadcast::Sender<u64>,
}

impl AuthHandle {
    pub fn new() -> Arc<Self> {
        let (expired_tx, _) = broadcast::channel(8);
        Arc::new(Self {
            token: RwLock::new(None),
            generation: AtomicU64::new(0),
            expired_latch: AtomicU64::new(0),
            expired_tx,
        })
    }

    /// Current bearer token together with the generation it belongs to.
    /// Returns None when the session is anonymous.
    pub async fn bearer(&self) -> Option<(String, u64)> {
        let token = self.token.read().await.clone()?;
        Some((token, self.generation.load(Ordering::SeqCst)))
    }

    /// Install a new credential, starting a new session generation.
    pub async fn set_token(&self, token: String) -> u64 {
        let mut guard = self.token.write().await;
        *guard = Some(token);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop the credential, ending the current session generation.
    pub async fn clear(&self) {
        let mut guard = self.token.write().await;
        *guard = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Report that the server rejected the credential a request carried.
    ///
    /// The report is dropped when the generation has been superseded (the
    /// request belonged to a session that already ended) or when this
    /// generation has signalled before (concurrent 401s collapse into one
    /// teardown). Returns whether a signal was actually emitted.
    pub fn report_expired(&self, generation: u64) -> bool {
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(generation, "ignoring expiry report from superseded session");
            return false;
        }
        if self.expired_latch.fetch_max(generation, Ordering::SeqCst) >= generation {
            debug!(generation, "expiry already signalled for this session");
            return false;
        }
        // Nobody listening is fine; the session store subscribes at startup.
        let _ = self.expired_tx.send(generation);
        true
    }

    /// Subscribe to expiry signals. Each element is the generation whose
    /// credential the server rejected.
    pub fn subscribe_expired(&self) -> broadcast::Receiver<u64> {
        self.expired_tx.subscribe()
    }
}
