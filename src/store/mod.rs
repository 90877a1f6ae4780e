//! Persistence for match rows behind one interface, with a local CSV file
//! backend and a remote spreadsheet backend.

pub mod local;
pub mod sheet;

pub use local::LocalStore;
pub use sheet::SheetStore;

use crate::auth::{self, Interaction, OAuthFiles};
use crate::error::{Result, ScoreError};
use crate::model::MatchRecord;
use std::path::PathBuf;

/// Read/append access to the stored match table.
///
/// Appends are read-modify-write on both backends and not safe against
/// concurrent writers.
pub trait ScoreStore {
    /// Short backend name for replies and logs
    fn name(&self) -> &'static str;

    /// All rows in write order; empty when nothing has been stored yet
    fn read(&self) -> Result<Vec<MatchRecord>>;

    /// Add rows after the existing ones
    fn append(&self, records: &[MatchRecord]) -> Result<()>;

    /// Move the current table aside and start empty. Returns where the
    /// backup went.
    fn clear(&self) -> Result<String>;
}

/// Settings for the remote spreadsheet backend
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub sheet_id: String,
    pub range: String,
    pub oauth: OAuthFiles,
}

/// Which backend to use, decided once at startup
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Local { path: PathBuf },
    Sheet(SheetConfig),
}

impl BackendConfig {
    /// Attach to the configured backend.
    ///
    /// The sheet backend needs a stored OAuth token; this never starts the
    /// interactive flow.
    pub fn open(&self) -> Result<Box<dyn ScoreStore>> {
        match self {
            BackendConfig::Local { path } => Ok(Box::new(LocalStore::new(path.clone()))),
            BackendConfig::Sheet(config) => {
                let client = auth::http_client()?;
                let token = auth::authorize(&client, &config.oauth, Interaction::Never)
                    .map_err(|e| ScoreError::BackendUnavailable(e.to_string()))?;
                let store = SheetStore::new(client, token, &config.sheet_id, &config.range)?;
                Ok(Box::new(store))
            }
        }
    }
}
