//! The append-only deployment journal.
//!
//! Each line of the journal file is one JSON-encoded [`DeploymentRecord`].
//! The file is only ever opened for appending, so the history of every
//! network survives later deployments.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{errors::DeployError, types::DeploymentRecord};

/// A handle on a journal file
#[derive(Clone, Debug)]
pub struct DeploymentJournal {
    /// The journal file
    path: PathBuf,
}

impl DeploymentJournal {
    /// Open the journal at `path`; the file is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The journal file's path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record and flush it to disk
    pub fn append(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        let mut line =
            serde_json::to_string(record).map_err(|e| DeployError::Journal(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| DeployError::Journal(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| DeployError::Journal(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), network = %record.network, "appended deployment record");
        Ok(())
    }

    /// Read every record, oldest first. A missing file is an empty journal
    pub fn records(&self) -> Result<Vec<DeploymentRecord>, DeployError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DeployError::Journal(format!("{}: {}", self.path.display(), e)))
            }
        };

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| {
                    DeployError::Journal(format!("{}:{}: {}", self.path.display(), i + 1, e))
                })
            })
            .collect()
    }

    /// The records for `network`, oldest first
    pub fn history(&self, network: &str) -> Result<Vec<DeploymentRecord>, DeployError> {
        let mut records = self.records()?;
        records.retain(|r| r.network == network);
        Ok(records)
    }

    /// The most recent record for `contract` on `network`
    pub fn latest(
        &self,
        network: &str,
        contract: &str,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        Ok(self.history(network)?.into_iter().rev().find(|r| r.contract == contract))
    }
}
