use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::Result;
use crate::domain::Session;
use crate::store::write_atomic;

pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

/// Why a cached session could not be used.
#[derive(Error, Debug)]
pub enum CacheMiss {
    #[error("no session cache at {0}")]
    Missing(PathBuf),

    #[error("session cache unreadable: {0}")]
    Unreadable(io::Error),

    #[error("session cache is not valid JSON: {0}")]
    Malformed(serde_json::Error),

    #[error("session cache has an unexpected shape: {0}")]
    SchemaMismatch(serde_json::Error),

    #[error("session cache is missing a token")]
    Incomplete,

    #[error("session cache expired ({} hours old)", .age.num_hours())]
    Expired { age: Duration },
}

/// Owns the persisted session cookies.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    expiry: Duration,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self {
            path: path.into(),
            expiry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Load the cached session if it is present, well-formed, complete and
    /// not expired.
    pub fn load(&self) -> Option<Session> {
        match self.inspect() {
            Ok(session) => {
                debug!(path = %self.path.display(), "Using cached session");
                Some(session)
            }
            Err(miss @ CacheMiss::Missing(_)) => {
                debug!("{}", miss);
                None
            }
            Err(miss @ CacheMiss::Expired { .. }) => {
                info!("{}", miss);
                None
            }
            Err(miss) => {
                warn!(path = %self.path.display(), "{}", miss);
                None
            }
        }
    }

    /// Like [`load`](Self::load) but reports the reason for a miss.
    pub fn inspect(&self) -> std::result::Result<Session, CacheMiss> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheMiss::Missing(self.path.clone()))
            }
            Err(e) => return Err(CacheMiss::Unreadable(e)),
        };

        let value: serde_json::Value = serde_json::from_str(&raw).map_err(CacheMiss::Malformed)?;
        let session: Session = serde_json::from_value(value).map_err(CacheMiss::SchemaMismatch)?;

        if !session.is_complete() {
            return Err(CacheMiss::Incomplete);
        }

        let now = Utc::now();
        if !session.is_fresh(now, self.expiry) {
            return Err(CacheMiss::Expired {
                age: session.age(now),
            });
        }

        Ok(session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_vec_pretty(session)?;
        write_atomic(&self.path, &json)?;
        debug!(path = %self.path.display(), "Saved session cache");
        Ok(())
    }
}
