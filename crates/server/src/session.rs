//! Session Management
//!
//! In-memory registry of live conversations. Each conversation owns a
//! [`ConversationSession`] behind an async mutex so turns of the same
//! conversation run one at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use farmhand_agent::{AgentServices, ConversationSession, SessionConfig};
use farmhand_core::ConversationId;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};

use crate::ServerError;

/// A live conversation
pub struct SessionEntry {
    pub session: Mutex<ConversationSession>,
    pub created_at: Instant,
    last_activity: RwLock<Instant>,
}

impl SessionEntry {
    fn new(session: ConversationSession) -> Self {
        let now = Instant::now();
        Self {
            session: Mutex::new(session),
            created_at: now,
            last_activity: RwLock::new(now),
        }
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.read().elapsed()
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }
}

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Session manager
pub struct SessionManager {
    sessions: DashMap<String, Arc<SessionEntry>>,
    services: AgentServices,
    config: SessionConfig,
    max_sessions: usize,
    session_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        services: AgentServices,
        config: SessionConfig,
        max_sessions: usize,
        session_timeout: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            services,
            config,
            max_sessions,
            session_timeout,
        }
    }

    /// Look up a conversation, creating it on first contact.
    ///
    /// Expired conversations are evicted before the capacity check.
    pub fn get_or_create(&self, id: &str) -> Result<Arc<SessionEntry>, ServerError> {
        if let Some(entry) = self.sessions.get(id) {
            entry.touch();
            return Ok(Arc::clone(entry.value()));
        }

        if self.sessions.len() >= self.max_sessions {
            self.cleanup_expired();
            if self.sessions.len() >= self.max_sessions {
                return Err(ServerError::Session(format!(
                    "Maximum sessions reached ({})",
                    self.max_sessions
                )));
            }
        }

        let entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(conversation = %id, "Created conversation session");
                Arc::new(SessionEntry::new(ConversationSession::new(
                    ConversationId::from(id),
                    self.services.clone(),
                    self.config.clone(),
                )))
            });
        Ok(Arc::clone(entry.value()))
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::info!(conversation = %id, "Removed conversation session");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Drop conversations idle longer than the session timeout
    pub fn cleanup_expired(&self) -> usize {
        let before = self.sessions.len();
        let timeout = self.session_timeout;
        self.sessions.retain(|_, entry| !entry.is_expired(timeout));
        before - self.sessions.len()
    }

    /// Periodically evict idle conversations until the returned sender
    /// is set to `true`.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let period = CLEANUP_INTERVAL;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let removed = manager.cleanup_expired();
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = manager.count(),
                                "Evicted idle conversations"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
