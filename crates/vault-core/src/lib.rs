//! vault_core — unlock flow for Obsidian Vault
//!
//! The session moves through `LOADING → SETUP | LOGIN → RECOVERY → UNLOCKED`.
//! [`session::transition`] is the pure rule set; [`SessionController`] runs
//! it against an [`ObjectStore`] and performs the storage side effects.

pub mod controller;
pub mod error;
pub mod paths;
pub mod preview;
pub mod session;
pub mod settings;

pub use controller::SessionController;
pub use error::SessionError;
pub use session::{AuthMode, Effect, Event, Passcode, SessionState, Step, MIN_PASSWORD_LEN};
pub use settings::VaultSettings;
pub use vault_store::{ObjectStore, StoreConfig, StoreError};
