//! Error types for the MCP server

use thiserror::Error;

/// Result type alias for MCP server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the serve loop
#[derive(Debug, Error)]
pub enum Error {
    /// IO error on the transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame could not be read from or written to the transport
    #[error("transport error: {0}")]
    Transport(#[from] tokio_util::codec::LinesCodecError),
}
