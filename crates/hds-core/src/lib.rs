//! Core types and trait definitions for HDS audit-log enrichment.
//!
//! This crate is deliberately free of HTTP and filesystem dependencies.
//! Backends (`hds-elastic`, `hds-webex`, `hds-token-file`) implement the
//! traits in [`store`]; the enrichment loop in `hds-enricher` depends only on
//! those traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod credential;
pub mod error;
pub mod memory;
pub mod profile;
pub mod record;
pub mod store;

pub use error::{Error, Result};
