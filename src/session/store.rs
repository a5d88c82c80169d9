use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::session::error::SessionError;
use crate::session::token::Token;

/// On-disk home of the current session token, one record per account.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    account: String,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>, account: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            account: account.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token.
    ///
    /// A missing file, unparsable content or a record of another account all
    /// mean "no token"; the file is overwritten by the next renewal anyway.
    /// Any other read failure is reported.
    pub async fn load(&self) -> Result<Option<Token>, SessionError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "token file absent");
                return Ok(None);
            }
            Err(err) => {
                return Err(SessionError::Io(format!("read {}: {}", self.path.display(), err)));
            }
        };

        let token: Token = match serde_json::from_str(&content) {
            Ok(token) => token,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "token file is corrupt, ignoring");
                return Ok(None);
            }
        };

        if token.source != self.account {
            warn!(
                path = %self.path.display(),
                stored = %token.source,
                expected = %self.account,
                "token file belongs to another account, ignoring"
            );
            return Ok(None);
        }

        Ok(Some(token))
    }

    /// Replace the stored token atomically: temp file (0600) -> fsync -> rename.
    pub async fn save(&self, token: &Token) -> Result<(), SessionError> {
        let content = serde_json::to_string_pretty(token)
            .map_err(|e| SessionError::Internal(format!("serialize token: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Io(format!("create {}: {}", parent.display(), e)))?;
        }

        let tmp = self.tmp_path();
        let write = async {
            let mut file = open_private(&tmp).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &self.path).await
        };

        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp).await;
            return Err(SessionError::Io(format!("write {}: {}", self.path.display(), err)));
        }

        info!(path = %self.path.display(), expires_at = %token.expires_at, "token stored");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[cfg(unix)]
async fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await
}

#[cfg(not(unix))]
async fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await
}
