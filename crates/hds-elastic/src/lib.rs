//! Elasticsearch backend for the audit-record store.
//!
//! Implements [`RecordStore`](hds_core::store::RecordStore) with three calls:
//! a filtered search for pending records, a one-hit search for a profile
//! already attached to some other record, and a partial `_update`.

mod query;
mod response;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{ElasticConfig, ElasticStore};

#[cfg(test)]
mod tests;
