/// Error types for the chat sync core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HearthError {
    #[error("Connect error: {0}")]
    Connect(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Listener cancelled: {0}")]
    Cancelled(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HearthError>;
