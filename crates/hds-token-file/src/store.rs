//! [`FileTokenStore`]: the JSON-file implementation of [`TokenStore`].

use std::{
  ffi::OsString,
  io::ErrorKind,
  path::{Path, PathBuf},
};

use hds_core::{credential::Credential, store::TokenStore};
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::debug;

use crate::{Error, Result};

/// A credential persisted as `{"token", "expires_in", "timestamp"}` at a fixed
/// path.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
  path: PathBuf,
}

impl FileTokenStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Sibling path the new contents are staged in before the rename.
  fn staging_path(&self) -> PathBuf {
    let mut name: OsString = self
      .path
      .file_name()
      .map(ToOwned::to_owned)
      .unwrap_or_else(|| OsString::from("token"));
    name.push(".tmp");
    self.path.with_file_name(name)
  }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
  move |source| Error::Io { path: path.to_path_buf(), source }
}

/// Write `body` to `path` and sync it to disk. The handle is dropped, and so
/// closed, on every return path.
async fn write_synced(path: &Path, body: &[u8]) -> Result<()> {
  let mut options = fs::OpenOptions::new();
  options.write(true).create(true).truncate(true);
  #[cfg(unix)]
  options.mode(0o600);

  let mut file = options.open(path).await.map_err(io_error(path))?;
  file.write_all(body).await.map_err(io_error(path))?;
  file.flush().await.map_err(io_error(path))?;
  file.sync_all().await.map_err(io_error(path))?;
  Ok(())
}

impl TokenStore for FileTokenStore {
  type Error = Error;

  async fn load(&self) -> Result<Option<Credential>> {
    let bytes = match fs::read(&self.path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "no persisted token");
        return Ok(None);
      }
      Err(e) => return Err(io_error(&self.path)(e)),
    };

    let credential: Credential = serde_json::from_slice(&bytes).map_err(|source| {
      Error::Parse { path: self.path.clone(), source }
    })?;
    debug!(
      path = %self.path.display(),
      expires_at = ?credential.expires_at(),
      "loaded persisted token"
    );
    Ok(Some(credential))
  }

  async fn save(&self, credential: &Credential) -> Result<()> {
    let body = serde_json::to_vec(credential)?;

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).await.map_err(io_error(parent))?;
    }

    let staging = self.staging_path();
    if let Err(e) = write_synced(&staging, &body).await {
      fs::remove_file(&staging).await.ok();
      return Err(e);
    }
    if let Err(e) = fs::rename(&staging, &self.path).await {
      fs::remove_file(&staging).await.ok();
      return Err(io_error(&self.path)(e));
    }

    debug!(
      path = %self.path.display(),
      expires_at = ?credential.expires_at(),
      "persisted token"
    );
    Ok(())
  }
}
