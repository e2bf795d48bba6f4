//! Core types and trait definitions for the verbal case-records store.
//!
//! This crate is deliberately free of database and network dependencies.
//! It holds the entity model, the pure business rules (validation, control
//! classification, status derivation, numbering) and the [`store::CaseStore`]
//! and [`notify::StatusNotifier`] seams that the other crates implement.

// We intentionally use native `async fn` in trait impls (stabilised in Rust
// 1.75). Suppress the advisory lint about `Send` bounds on the returned
// futures.
#![allow(async_fn_in_trait)]

pub mod classify;
pub mod control;
pub mod decision;
pub mod error;
pub mod folder;
pub mod lifecycle;
pub mod minute;
pub mod notify;
pub mod numbering;
pub mod plot;
pub mod projection;
pub mod query;
pub mod reference;
pub mod store;
pub mod updating;
pub mod validate;

pub use error::{Error, Result};
