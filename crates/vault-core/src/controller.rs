//! Async driver for the session state machine.

use std::collections::VecDeque;
use std::path::Path;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use vault_store::ObjectStore;

use crate::error::SessionError;
use crate::session::{transition, AuthMode, Effect, Event, Passcode, SessionState, Step};

/// Owns the session state and performs the storage work each transition
/// asks for. One controller per process; the store handle is injected.
pub struct SessionController {
    store: ObjectStore,
    state: SessionState,
    mode_tx: watch::Sender<AuthMode>,
}

impl SessionController {
    pub fn new(store: ObjectStore) -> Self {
        let (mode_tx, _) = watch::channel(AuthMode::Loading);
        Self {
            store,
            state: SessionState::default(),
            mode_tx,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.state.mode()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Location of the backing database. Available in every mode.
    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    /// Observe mode changes, e.g. to drive a lock screen.
    pub fn subscribe(&self) -> watch::Receiver<AuthMode> {
        self.mode_tx.subscribe()
    }

    /// File operations, available only once unlocked.
    pub fn files(&self) -> Result<&ObjectStore, SessionError> {
        match self.state {
            SessionState::Unlocked => Ok(&self.store),
            _ => Err(SessionError::Locked),
        }
    }

    /// Pick SETUP or LOGIN from whether a passcode is stored.
    ///
    /// A storage error leaves the session in LOADING; call again to retry.
    pub async fn check_initial_mode(&mut self) -> Result<AuthMode, SessionError> {
        let has_password = self.store.has_password().await.map_err(|e| {
            error!("[session] initial mode check failed: {e}");
            SessionError::from(e)
        })?;
        self.dispatch(Event::PasswordProbed { has_password }).await
    }

    pub async fn submit_setup(&mut self, password: &str, confirm: &str) -> Result<AuthMode, SessionError> {
        self.dispatch(Event::SubmitSetup {
            password: Passcode::from(password),
            confirm: Passcode::from(confirm),
        })
        .await
    }

    /// On `AccessDenied` the session stays in LOGIN and the caller should
    /// clear the attempted input.
    pub async fn submit_login(&mut self, attempt: &str) -> Result<AuthMode, SessionError> {
        self.dispatch(Event::SubmitLogin {
            attempt: Passcode::from(attempt),
        })
        .await
    }

    pub async fn request_recovery(&mut self) -> Result<AuthMode, SessionError> {
        self.dispatch(Event::RequestRecovery).await
    }

    pub async fn return_to_login(&mut self) -> Result<AuthMode, SessionError> {
        self.dispatch(Event::ReturnToLogin).await
    }

    /// Report a successful (simulated) biometric scan.
    ///
    /// Coming from setup, this stores the pending passcode first; if that
    /// write fails the pending passcode is kept and the call can be repeated.
    pub async fn confirm_recovery(&mut self) -> Result<AuthMode, SessionError> {
        self.dispatch(Event::ScanSucceeded).await
    }

    async fn dispatch(&mut self, event: Event) -> Result<AuthMode, SessionError> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let name = event.name();
            let Step { state, effects } = transition(&self.state, event).map_err(|e| {
                debug!("[session] {name} rejected in {}: {e}", self.state.mode());
                e
            })?;
            self.set_state(state);
            for effect in effects {
                if let Some(follow_up) = self.perform(effect).await? {
                    queue.push_back(follow_up);
                }
            }
        }
        Ok(self.mode())
    }

    async fn perform(&self, effect: Effect) -> Result<Option<Event>, SessionError> {
        match effect {
            Effect::VerifyPassword(attempt) => {
                let valid = self.store.verify_password(attempt.expose()).await?;
                Ok(Some(Event::LoginChecked { valid }))
            }
            Effect::PersistPassword(password) => {
                self.store.set_password(password.expose()).await.map_err(|e| {
                    error!("[session] storing passcode failed: {e}");
                    SessionError::from(e)
                })?;
                info!("[session] passcode stored");
                Ok(Some(Event::PasswordPersisted))
            }
            Effect::Unlocked { credential_checked } => {
                if credential_checked {
                    info!("[session] vault unlocked");
                } else {
                    warn!("[session] vault unlocked through biometric override without a passcode check");
                }
                Ok(None)
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        let from = self.state.mode();
        self.state = state;
        let to = self.state.mode();
        // Self-transitions (e.g. LOGIN while verifying) are not mode changes.
        if from == to {
            return;
        }
        debug!("[session] {from} -> {to}");
        self.mode_tx.send_if_modified(|current| {
            let changed = *current != to;
            *current = to;
            changed
        });
    }
}
