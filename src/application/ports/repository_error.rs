#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
    #[error("duplicate job: {0}")]
    Duplicate(String),
}
