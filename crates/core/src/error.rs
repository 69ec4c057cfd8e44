use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no browser extensions connected")]
    NoAgent,

    #[error("agent writer congested, frame could not be queued")]
    Congested,

    #[error("agent disconnected while the request was pending")]
    AgentGone,

    #[error("request timeout: {action} gave no reply within {seconds}s")]
    Timeout { action: String, seconds: u64 },

    #[error("invalid resource uri: {0}")]
    InvalidUri(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// JSON-RPC error code this error maps to at the client boundary.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Error::InvalidParams(_) => -32602,
            Error::UnknownMethod(_) => -32601,
            _ => -32603,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
