//! vault_store — durable local object store for Obsidian Vault
//!
//! # Layout
//! One SQLite database holds two independent collections:
//! - `files`: binary blobs plus metadata, keyed by a generated UUID.
//! - `config`: keyed singleton settings stored as JSON text. Only
//!   `"password"` is used by the unlock flow.
//!
//! The stored password is plaintext and blobs are not encrypted. Anyone
//! with read access to the database file can recover both.
//!
//! # Migration
//! SQLx migrations in `migrations/` are run on first open.

pub mod batch;
pub mod db;
pub mod error;
pub mod migrations;
pub mod models;

pub use batch::{BatchFailure, BatchReport};
pub use db::{ObjectStore, StoreConfig, PASSWORD_KEY};
pub use error::StoreError;
pub use models::{ConfigEntry, FileSummary, NewFile, VaultFile};
