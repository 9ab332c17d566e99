use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Webex(#[from] hds_webex::Error),

  /// Adding a person to a new space failed and skipping was not allowed.
  #[error("adding {person_id} to space {room_id} failed: {source}")]
  Membership {
    room_id:   String,
    person_id: String,
    #[source]
    source:    hds_webex::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
