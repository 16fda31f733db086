//! Session state machine.
//!
//! [`transition`] is pure: it maps the current state and an event to the
//! next state plus the storage work the driver must do. An `Err` means the
//! state did not change.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SessionError;

/// Shortest passcode accepted during setup, in characters.
pub const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    Loading,
    Setup,
    Login,
    Recovery,
    Unlocked,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMode::Loading => "LOADING",
            AuthMode::Setup => "SETUP",
            AuthMode::Login => "LOGIN",
            AuthMode::Recovery => "RECOVERY",
            AuthMode::Unlocked => "UNLOCKED",
        };
        f.write_str(name)
    }
}

/// A passcode held in memory. Wiped on drop, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Passcode(String);

impl Passcode {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<&str> for Passcode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Passcode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passcode(***)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Loading,
    Setup,
    Login,
    /// Simulated biometric gate. `pending` is set when reached from setup
    /// and holds the passcode that has not been stored yet.
    Recovery { pending: Option<Passcode> },
    Unlocked,
}

impl SessionState {
    pub fn mode(&self) -> AuthMode {
        match self {
            SessionState::Loading => AuthMode::Loading,
            SessionState::Setup => AuthMode::Setup,
            SessionState::Login => AuthMode::Login,
            SessionState::Recovery { .. } => AuthMode::Recovery,
            SessionState::Unlocked => AuthMode::Unlocked,
        }
    }

    pub fn pending(&self) -> Option<&Passcode> {
        match self {
            SessionState::Recovery { pending } => pending.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Result of the startup `has_password` query.
    PasswordProbed { has_password: bool },
    SubmitSetup { password: Passcode, confirm: Passcode },
    SubmitLogin { attempt: Passcode },
    /// Result of a `VerifyPassword` effect.
    LoginChecked { valid: bool },
    /// The "biometric override" escape hatch from the login screen.
    RequestRecovery,
    ReturnToLogin,
    /// Reported by the external biometric collaborator.
    ScanSucceeded,
    /// A `PersistPassword` effect committed.
    PasswordPersisted,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::PasswordProbed { .. } => "password_probed",
            Event::SubmitSetup { .. } => "submit_setup",
            Event::SubmitLogin { .. } => "submit_login",
            Event::LoginChecked { .. } => "login_checked",
            Event::RequestRecovery => "request_recovery",
            Event::ReturnToLogin => "return_to_login",
            Event::ScanSucceeded => "scan_succeeded",
            Event::PasswordPersisted => "password_persisted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Compare the attempt with the stored passcode, then feed
    /// `LoginChecked` back in.
    VerifyPassword(Passcode),
    /// Store the passcode, then feed `PasswordPersisted` back in.
    PersistPassword(Passcode),
    /// The session reached `Unlocked`. `credential_checked` is false when
    /// the biometric override was used from the login screen.
    Unlocked { credential_checked: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub state: SessionState,
    pub effects: Vec<Effect>,
}

impl Step {
    fn to(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Check a new passcode and its confirmation. Touches no storage.
pub fn validate_new_password(password: &Passcode, confirm: &Passcode) -> Result<(), SessionError> {
    let actual = password.char_len();
    if actual < MIN_PASSWORD_LEN {
        return Err(SessionError::TooShort {
            min: MIN_PASSWORD_LEN,
            actual,
        });
    }
    if password != confirm {
        return Err(SessionError::Mismatch);
    }
    Ok(())
}

pub fn transition(state: &SessionState, event: Event) -> Result<Step, SessionError> {
    use SessionState as S;

    match (state, event) {
        (S::Loading, Event::PasswordProbed { has_password }) => Ok(Step::to(if has_password {
            S::Login
        } else {
            S::Setup
        })),

        // The passcode is carried, not stored, until the scan succeeds.
        (S::Setup, Event::SubmitSetup { password, confirm }) => {
            validate_new_password(&password, &confirm)?;
            Ok(Step::to(S::Recovery {
                pending: Some(password),
            }))
        }

        (S::Login, Event::SubmitLogin { attempt }) => {
            Ok(Step::to(S::Login).with(Effect::VerifyPassword(attempt)))
        }
        (S::Login, Event::LoginChecked { valid: true }) => {
            Ok(Step::to(S::Unlocked).with(Effect::Unlocked {
                credential_checked: true,
            }))
        }
        (S::Login, Event::LoginChecked { valid: false }) => Err(SessionError::AccessDenied),
        (S::Login, Event::RequestRecovery) => Ok(Step::to(S::Recovery { pending: None })),

        (S::Recovery { pending: None }, Event::ReturnToLogin) => Ok(Step::to(S::Login)),
        (S::Recovery { pending: Some(password) }, Event::ScanSucceeded) => {
            Ok(Step::to(state.clone()).with(Effect::PersistPassword(password.clone())))
        }
        (S::Recovery { pending: Some(_) }, Event::PasswordPersisted) => {
            Ok(Step::to(S::Unlocked).with(Effect::Unlocked {
                credential_checked: true,
            }))
        }
        // Known gap: reached from the login screen, a scan unlocks without
        // any passcode check. The scan itself is only a timed animation.
        (S::Recovery { pending: None }, Event::ScanSucceeded) => {
            Ok(Step::to(S::Unlocked).with(Effect::Unlocked {
                credential_checked: false,
            }))
        }

        (state, event) => Err(SessionError::InvalidTransition {
            mode: state.mode(),
            event: event.name(),
        }),
    }
}
