//! The create-space / invite / post cycle.

use std::{future::Future, time::Duration};

use hds_webex::{Person, WebexClient};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct TrafficConfig {
  /// Space titles are `"{title_prefix} {uuid}"`.
  pub title_prefix:            String,
  pub message:                 String,
  /// Pause after each cycle.
  pub interval:                Duration,
  /// Page size for the people listing.
  pub max_people:              u32,
  /// Log and continue when a membership cannot be created.
  pub skip_failed_memberships: bool,
  /// Stop after this many cycles. Unbounded when `None`.
  pub cycles:                  Option<u32>,
}

impl Default for TrafficConfig {
  fn default() -> Self {
    Self {
      title_prefix:            "zz auto generated".into(),
      message:                 "Space automatically created to cause some traffic".into(),
      interval:                Duration::from_secs(30),
      max_people:              1000,
      skip_failed_memberships: false,
      cycles:                  None,
    }
  }
}

/// The caller and the people every new space is shared with.
#[derive(Debug, Clone)]
pub struct Roster {
  pub me:       Person,
  pub invitees: Vec<Person>,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
  pub room_id: String,
  pub title:   String,
  pub added:   usize,
  pub failed:  usize,
}

/// People who have accepted their invitation, minus the caller.
///
/// A person whose `invitePending` flag is missing is left out, as is anyone
/// still pending.
pub fn select_invitees(people: Vec<Person>, me_id: &str) -> Vec<Person> {
  people
    .into_iter()
    .filter(|p| p.invite_pending == Some(false) && p.id != me_id)
    .collect()
}

pub struct TrafficGenerator {
  client: WebexClient,
  config: TrafficConfig,
}

impl TrafficGenerator {
  /// `client` must carry a bearer token.
  pub fn new(client: WebexClient, config: TrafficConfig) -> Self { Self { client, config } }

  pub async fn roster(&self) -> Result<Roster> {
    let me = self.client.me().await?;
    let people = self.client.list_people(self.config.max_people).await?;
    let invitees = select_invitees(people, &me.id);

    let names: Vec<&str> = invitees.iter().map(|p| p.display_name.as_str()).collect();
    info!(count = invitees.len(), people = %names.join(", "), "found people to invite");
    Ok(Roster { me, invitees })
  }

  /// Create one space, add everyone in `roster`, and post the message.
  pub async fn cycle(&self, roster: &Roster) -> Result<CycleReport> {
    let title = format!("{} {}", self.config.title_prefix, Uuid::new_v4());
    let room = self.client.create_room(&title).await?;
    info!(room_id = %room.id, %title, "created space");

    let mut report = CycleReport { room_id: room.id.clone(), title, added: 0, failed: 0 };
    for person in &roster.invitees {
      match self.client.add_membership(&room.id, &person.id, true).await {
        Ok(_) => {
          report.added += 1;
          info!(person = %person.display_name, "added to space");
        }
        Err(e) if self.config.skip_failed_memberships => {
          report.failed += 1;
          warn!(person = %person.display_name, error = %e, "could not add to space; skipping");
        }
        Err(source) => {
          return Err(Error::Membership {
            room_id: room.id.clone(),
            person_id: person.id.clone(),
            source,
          });
        }
      }
    }

    self.client.post_message(&room.id, &self.config.message).await?;
    info!(room_id = %room.id, "posted message");
    Ok(report)
  }

  /// Fetch the roster once, then cycle until `shutdown` resolves or the
  /// configured cycle count is reached. Returns the number of completed
  /// cycles.
  pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<u32> {
    let roster = self.roster().await?;
    let mut done = 0;

    tokio::pin!(shutdown);
    loop {
      self.cycle(&roster).await?;
      done += 1;
      if self.config.cycles.is_some_and(|n| done >= n) {
        break;
      }

      info!(secs = self.config.interval.as_secs(), "sleeping");
      tokio::select! {
        _ = &mut shutdown => break,
        _ = tokio::time::sleep(self.config.interval) => {}
      }
    }
    Ok(done)
  }
}
