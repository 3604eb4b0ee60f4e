#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("write operations are disabled while the service is read-only")]
    ReadOnly,
    #[error("{0}")]
    Internal(String),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
}
