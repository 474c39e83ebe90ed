// Crate-wide error type. Every variant maps to a wire error code a client sees.
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthenticated,
    Unauthorized,
    NotFound(String),
    NoTasks,
    InvalidSignature(String),
    NonceOutOfRange,
    HashMismatch,
    DifficultyNotMet,
    ChainRejected(String),
    ServerError(String),
}

impl AppError {
    /// The wire status code a client receives for this error kind.
    pub fn code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthenticated => 401,
            AppError::Unauthorized => 403,
            AppError::NotFound(_) => 404,
            AppError::NoTasks => 409,
            AppError::InvalidSignature(_)
            | AppError::NonceOutOfRange
            | AppError::HashMismatch
            | AppError::DifficultyNotMet => 422,
            AppError::ChainRejected(_) | AppError::ServerError(_) => 500,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "{msg}"),
            AppError::Unauthenticated => write!(f, "Authentication required"),
            AppError::Unauthorized => write!(f, "Role does not permit this command"),
            AppError::NotFound(msg) => write!(f, "{msg}"),
            AppError::NoTasks => write!(f, "No pending mining tasks"),
            AppError::InvalidSignature(msg) => write!(f, "{msg}"),
            AppError::NonceOutOfRange => write!(f, "Nonce outside assigned range"),
            AppError::HashMismatch => write!(f, "Submitted hash does not match recomputed hash"),
            AppError::DifficultyNotMet => write!(f, "Hash does not meet required difficulty"),
            AppError::ChainRejected(msg) => write!(f, "{msg}"),
            AppError::ServerError(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;
