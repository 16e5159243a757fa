//! Scrobble sync library - shared modules for both binaries.
//!
//! Reconciles a streaming service's play log against a scrobble ledger:
//! metadata cleaning, canonical matching, duplicate suppression and the
//! local history store.

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod providers;
pub mod safety;
pub mod scoring;
pub mod store;

pub use error::{Error, Result};
