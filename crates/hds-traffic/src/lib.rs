//! Synthetic traffic for a Webex organisation.
//!
//! Repeatedly creates a space, invites every active person in the
//! organisation as a moderator and posts a message, so that the HDS key
//! management service sees a steady stream of KMS requests.

mod generator;

pub mod error;

pub use error::{Error, Result};
pub use generator::{CycleReport, Roster, TrafficConfig, TrafficGenerator, select_invitees};
