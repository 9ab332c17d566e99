//! Client for the Webex REST API.
//!
//! Implements [`IdentityProvider`](hds_core::store::IdentityProvider) (OAuth
//! token refresh and people lookup) and exposes the handful of space,
//! membership and message calls the traffic generator needs.

mod client;
mod spaces;

pub mod error;

pub use client::{WebexClient, WebexConfig};
pub use error::{Error, Result};
pub use spaces::{Membership, Message, Person, Room};
