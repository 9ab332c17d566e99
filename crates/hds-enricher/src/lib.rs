//! The HDS audit-log enrichment loop.
//!
//! [`Enricher`] polls a [`RecordStore`](hds_core::store::RecordStore) for
//! KMS request records that have no subject profile yet, resolves each
//! subject id (store cache first, then the identity provider) and writes the
//! profile back onto the record. [`TokenLifecycle`] keeps the identity
//! provider's access token fresh and persisted.

#![allow(async_fn_in_trait)]

pub mod backoff;
pub mod config;
pub mod enricher;
pub mod error;
pub mod lifecycle;

pub use config::EnricherConfig;
pub use enricher::{Enricher, EnricherSettings, LoopState, PassReport, Resolution, Tick};
pub use error::{Error, Result};
pub use lifecycle::TokenLifecycle;
