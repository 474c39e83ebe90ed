// Reward ledger: per-user counter, persisted atomically via temp-file + rename.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

pub struct RewardLedger {
    path: PathBuf,
    balances: HashMap<String, u64>,
}

impl RewardLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<RewardLedger, AppError> {
        let path = path.into();
        let balances = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| AppError::ServerError(format!("cannot read reward ledger: {e}")))?;
            serde_json::from_slice(&bytes).map_err(|e| AppError::ServerError(format!("corrupt reward ledger: {e}")))?
        } else {
            HashMap::new()
        };
        Ok(RewardLedger { path, balances })
    }

    pub fn get(&self, username: &str) -> u64 {
        self.balances.get(username).copied().unwrap_or(0)
    }

    /// Credits `username` by `amount` and persists the ledger atomically.
    /// Returns the new balance.
    pub fn credit(&mut self, username: &str, amount: u64) -> Result<u64, AppError> {
        let entry = self.balances.entry(username.to_string()).or_insert(0);
        *entry += amount;
        let balance = *entry;
        self.save()?;
        Ok(balance)
    }

    fn save(&self) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(&self.balances).map_err(|e| AppError::ServerError(e.to_string()))?;
        let tmp_path = tmp_path(&self.path);
        fs::write(&tmp_path, json).map_err(|e| AppError::ServerError(format!("cannot write reward ledger: {e}")))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| AppError::ServerError(format!("cannot commit reward ledger: {e}")))?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
