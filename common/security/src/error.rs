use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unreachable: {0}")]
    Transport(String),
    #[error("document store returned HTTP {status} for {path}")]
    Status { path: String, status: u16 },
    #[error("malformed document at {path}: {reason}")]
    Decode { path: String, reason: String },
}
