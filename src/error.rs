/// Structured errors for migration setup and per-file transport failures.
#[derive(Debug, Clone)]
pub enum MigrateError {
    /// A spill file for a worker buffer could not be created.
    BufferCreateFailed(String),
    /// Base URL of a store cannot be parsed or cannot carry a path.
    InvalidUrl(String, String),
    /// The source file list could not be fetched or decoded.
    FileListUnavailable(String),
    FetchFailed(String),
    SendFailed(String),
    DeleteFailed(String),
    /// Non-success HTTP status, keeps url and status code
    UnexpectedStatus(String, u16),
    BufferIo(String),
    WorkerPanicked(usize),
    OperationFailed(String),
}

impl std::fmt::Display for MigrateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use MigrateError::*;
        match self {
            BufferCreateFailed(msg) => write!(f, "cannot create transfer buffer: {}", msg),
            InvalidUrl(url, msg) => write!(f, "invalid store url '{}': {}", url, msg),
            FileListUnavailable(url) => write!(f, "file list unavailable at {}", url),
            FetchFailed(name) => write!(f, "failed to fetch '{}' from source", name),
            SendFailed(name) => write!(f, "failed to send '{}' to destination", name),
            DeleteFailed(name) => {
                write!(f, "copied '{}' but failed to delete it from source", name)
            }
            UnexpectedStatus(url, code) => write!(f, "unexpected status {} from {}", code, url),
            BufferIo(msg) => write!(f, "buffer io error: {}", msg),
            WorkerPanicked(id) => write!(f, "worker {} panicked", id),
            OperationFailed(msg) => write!(f, "operation failed: {}", msg),
        }
    }
}

impl std::error::Error for MigrateError {}

impl MigrateError {
    /// Whether another attempt of the same request may succeed. Server side
    /// and IO failures are transient; client errors and setup problems are not.
    pub fn is_retriable(&self) -> bool {
        use MigrateError::*;
        match self {
            UnexpectedStatus(_, code) => *code >= 500 || *code == 408 || *code == 429,
            BufferIo(_) | OperationFailed(_) => true,
            BufferCreateFailed(_)
            | InvalidUrl(_, _)
            | FileListUnavailable(_)
            | FetchFailed(_)
            | SendFailed(_)
            | DeleteFailed(_)
            | WorkerPanicked(_) => false,
        }
    }
}
