// Authentication/authorization: user registry load + bcrypt credential check.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Miner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub hashed_password: String,
    pub role: Role,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

/// Loads the user registry fresh from disk. No cache: the file is the source
/// of truth on every authentication attempt. A missing file is an empty
/// registry, not an error.
pub fn load_users(path: impl AsRef<Path>) -> Result<Vec<User>, AppError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path).map_err(|e| AppError::ServerError(format!("cannot read user registry: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::ServerError(format!("corrupt user registry: {e}")))
}

/// Verifies `username`/`password` against the registry at `path`, honoring
/// `status`: a non-"active" user never authenticates, even with a correct
/// password.
pub fn authenticate(path: impl AsRef<Path>, username: &str, password: &str) -> Result<User, AppError> {
    let users = load_users(path)?;
    let user = users
        .into_iter()
        .find(|u| u.username == username)
        .ok_or(AppError::Unauthenticated)?;

    if user.status != "active" {
        return Err(AppError::Unauthenticated);
    }

    let matches = bcrypt::verify(password, &user.hashed_password)
        .map_err(|e| AppError::ServerError(format!("bcrypt verification failed: {e}")))?;
    if !matches {
        return Err(AppError::Unauthenticated);
    }
    Ok(user)
}
