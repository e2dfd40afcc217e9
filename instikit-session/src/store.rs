//! The session store
//!
//! Owns the authenticated-identity state machine:
//! `Unknown → Verifying → {Authenticated, Anonymous}`, with `Verifying`
//! reachable only at startup. The store is the single writer of the
//! persisted credential and the shared token handle; the pipeline and the
//! realtime bridge only read them. Transitions into and out of
//! `Authenticated` are fanned out as [`SessionEvent`]s.

use crate::identity::{Identity, Role};
use crate::storage::CredentialStore;
use instikit_client::{AuthApi, AuthHandle, LoginRequest, ProfileUpdate};
use instikit_core::{InstikitError, InstikitResult};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup state, nothing decided yet
    Unknown,
    /// A persisted credential is being checked against the server;
    /// authorization decisions must wait
    Verifying,
    Authenticated,
    Anonymous,
}

/// Read-only view of the current session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub identity: Option<Identity>,
    pub last_error: Option<String>,
}

/// Lifecycle transitions consumers can follow
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session generation began (login or verified startup credential)
    Authenticated { generation: u64, identity: Identity },
    /// The authenticated interval ended (logout or global auth failure)
    Anonymous { generation: u64 },
}

struct SessionState {
    status: SessionStatus,
    identity: Option<Identity>,
    last_error: Option<String>,
}

/// Owns the authenticated identity, the persisted credential and the
/// session event stream
pub struct SessionStore {
    state: RwLock<SessionState>,
    credentials: CredentialStore,
    api: AuthApi,
    auth: Arc<AuthHandle>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Assemble a store from its collaborators and start the expiry
    /// listener that turns pipeline teardown signals into state changes.
    pub fn new(api: AuthApi, credentials: CredentialStore) -> Arc<Self> {
        let auth = api.client().auth().clone();
        let (events, _) = broadcast::channel(16);

        let store = Arc::new(Self {
            state: RwLock::new(SessionState {
                status: SessionStatus::Unknown,
                identity: None,
                last_error: None,
            }),
            credentials,
            api,
            auth,
            events,
        });
        store.spawn_expiry_listener();
        store
    }

    /// The shared credential handle (token + generation), readable by the
    /// pipeline and the realtime bridge.
    pub fn auth(&self) -> &Arc<AuthHandle> {
        &self.auth
    }

    /// Subscribe to session lifecycle transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            status: state.status,
            identity: state.identity.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Load and verify the persisted credential. Completes (success or
    /// failure) before any authorization decision can be trusted; callers
    /// observe `Verifying` in the meantime.
    pub async fn initialize(&self) -> InstikitResult<SessionSnapshot> {
        let Some(token) = self.credentials.load()? else {
            let mut state = self.state.write().await;
            state.status = SessionStatus::Anonymous;
            debug!("no persisted credential, starting anonymous");
            return Ok(snapshot_of(&state));
        };

        {
            let mut state = self.state.write().await;
            state.status = SessionStatus::Verifying;
        }
        let generation = self.auth.set_token(token).await;

        match self.api.me::<Identity>().await {
            Ok(identity) => {
                info!(user = %identity.display_string(), "persisted credential accepted");
                let mut state = self.state.write().await;
                state.status = SessionStatus::Authenticated;
                state.identity = Some(identity.clone());
                state.last_error = None;
                let snapshot = snapshot_of(&state);
                drop(state);
                let _ = self.events.send(SessionEvent::Authenticated {
                    generation,
                    identity,
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!("persisted credential rejected: {}", e);
                let mut state = self.state.write().await;
                // The expiry listener may have torn the session down while
                // we held no lock; clearing twice is harmless.
                self.credentials.clear()?;
                self.auth.clear().await;
                state.status = SessionStatus::Anonymous;
                state.identity = None;
                state.last_error = Some(e.to_string());
                Ok(snapshot_of(&state))
            }
        }
    }

    /// Exchange credentials for a session. On success the token is
    /// persisted and the store becomes `Authenticated`; on failure state is
    /// left unchanged apart from `last_error`, for caller-side display.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        expected_role: Option<Role>,
    ) -> InstikitResult<Identity> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            role: expected_role.map(|role| role.to_string()),
        };

        match self.api.login::<Identity>(&request).await {
            Ok(data) => {
                self.credentials.store(&data.token)?;
                let generation = self.auth.set_token(data.token).await;

                let mut state = self.state.write().await;
                state.status = SessionStatus::Authenticated;
                state.identity = Some(data.user.clone());
                state.last_error = None;
                drop(state);

                info!(user = %data.user.display_string(), "login succeeded");
                let _ = self.events.send(SessionEvent::Authenticated {
                    generation,
                    identity: data.user.clone(),
                });
                Ok(data.user)
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// End the session locally. Idempotent; no network traffic.
    pub async fn logout(&self) -> InstikitResult<()> {
        let mut state = self.state.write().await;
        if state.status == SessionStatus::Anonymous {
            return Ok(());
        }

        self.credentials.clear()?;
        self.auth.clear().await;
        state.status = SessionStatus::Anonymous;
        state.identity = None;
        drop(state);

        info!("logged out");
        let _ = self.events.send(SessionEvent::Anonymous {
            generation: self.auth.current_generation(),
        });
        Ok(())
    }

    /// Apply server-confirmed profile changes to the current identity.
    /// Never changes the session status.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> InstikitResult<Identity> {
        {
            let state = self.state.read().await;
            if state.status != SessionStatus::Authenticated {
                return Err(InstikitError::session(
                    "cannot update profile without an authenticated session",
                ));
            }
        }

        let identity: Identity = self.api.update_profile(update).await?;

        let mut state = self.state.write().await;
        state.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Teardown entry point for the pipeline's expiry signal. No network;
    /// a no-op when the generation is superseded or the session already
    /// ended. Returns whether a teardown actually happened.
    pub async fn force_anonymous(&self, generation: u64) -> bool {
        if generation != self.auth.current_generation() {
            debug!(generation, "stale expiry signal ignored");
            return false;
        }

        let mut state = self.state.write().await;
        if state.status == SessionStatus::Anonymous {
            return false;
        }

        if let Err(e) = self.credentials.clear() {
            warn!("failed to clear credential during teardown: {}", e);
        }
        self.auth.clear().await;
        state.status = SessionStatus::Anonymous;
        state.identity = None;
        state.last_error = Some("session expired".to_string());
        drop(state);

        warn!("session expired, signed out");
        let _ = self.events.send(SessionEvent::Anonymous {
            generation: self.auth.current_generation(),
        });
        true
    }

    fn spawn_expiry_listener(self: &Arc<Self>) {
        let store = Arc::downgrade(self);
        let mut expired = self.auth.subscribe_expired();

        tokio::spawn(async move {
            loop {
                match expired.recv().await {
                    Ok(generation) => {
                        let Some(store) = store.upgrade() else { break };
                        store.force_anonymous(generation).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "expiry listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

fn snapshot_of(state: &SessionState) -> SessionSnapshot {
    SessionSnapshot {
        status: state.status,
        identity: state.identity.clone(),
        last_error: state.last_error.clone(),
    }
}
