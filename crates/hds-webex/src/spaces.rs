//! People, spaces, memberships and messages.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/people/me` | The caller |
//! | `GET`  | `/people?max=<n>` | Everyone visible to the caller |
//! | `POST` | `/rooms` | Body: `{"title": "..."}` |
//! | `POST` | `/memberships` | Body: `{"roomId", "personId", "isModerator"}` |
//! | `POST` | `/messages` | Body: `{"roomId", "text"}` |

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{Result, WebexClient};

// ─── Resources ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
  pub id:             String,
  #[serde(default)]
  pub display_name:   String,
  #[serde(default)]
  pub emails:         Vec<String>,
  /// `Some(true)` until the person accepts their invitation.
  #[serde(default)]
  pub invite_pending: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
  pub id:    String,
  #[serde(default)]
  pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
  pub id:           String,
  #[serde(default)]
  pub room_id:      Option<String>,
  #[serde(default)]
  pub person_id:    Option<String>,
  #[serde(default)]
  pub is_moderator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub id:      String,
  #[serde(default)]
  pub room_id: Option<String>,
  #[serde(default)]
  pub text:    Option<String>,
}

#[derive(Deserialize)]
struct Items<T> {
  items: Vec<T>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMembership<'a> {
  room_id:      &'a str,
  person_id:    &'a str,
  is_moderator: bool,
}

// ─── Calls ────────────────────────────────────────────────────────────────────

impl WebexClient {
  /// `GET /people/me`
  pub async fn me(&self) -> Result<Person> {
    let req = self.authed(self.client.get(self.endpoint(&["people", "me"])))?;
    let resp = Self::expect_success("GET", req.send().await?).await?;
    Ok(resp.json().await?)
  }

  /// `GET /people?max=<max>`
  pub async fn list_people(&self, max: u32) -> Result<Vec<Person>> {
    let req = self
      .authed(self.client.get(self.endpoint(&["people"])))?
      .query(&[("max", max)]);
    let resp = Self::expect_success("GET", req.send().await?).await?;
    let page: Items<Person> = resp.json().await?;
    Ok(page.items)
  }

  /// `POST /rooms`
  pub async fn create_room(&self, title: &str) -> Result<Room> {
    let req = self
      .authed(self.client.post(self.endpoint(&["rooms"])))?
      .json(&json!({ "title": title }));
    let resp = Self::expect_success("POST", req.send().await?).await?;
    Ok(resp.json().await?)
  }

  /// `POST /memberships`
  pub async fn add_membership(
    &self,
    room_id: &str,
    person_id: &str,
    is_moderator: bool,
  ) -> Result<Membership> {
    let req = self
      .authed(self.client.post(self.endpoint(&["memberships"])))?
      .json(&NewMembership { room_id, person_id, is_moderator });
    let resp = Self::expect_success("POST", req.send().await?).await?;
    Ok(resp.json().await?)
  }

  /// `POST /messages`
  pub async fn post_message(&self, room_id: &str, text: &str) -> Result<Message> {
    let req = self
      .authed(self.client.post(self.endpoint(&["messages"])))?
      .json(&json!({ "roomId": room_id, "text": text }));
    let resp = Self::expect_success("POST", req.send().await?).await?;
    Ok(resp.json().await?)
  }
}
