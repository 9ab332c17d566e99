//! File-backed [`TokenStore`](hds_core::store::TokenStore).
//!
//! The credential lives in a single JSON document. Every save rewrites the
//! whole file through a sibling temporary file and a rename, so a reader
//! never observes a half-written token.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::FileTokenStore;
