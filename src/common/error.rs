//! Error types for simpleriak

use crate::reply::Reply;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Request Errors ===
    #[error("No bucket specified")]
    NoBucketSpecified,

    #[error("No key specified")]
    NoKeySpecified,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Transport Errors ===
    /// No response was received. The attached reply carries status 500 and
    /// the failure message as its data.
    #[error("Transport error: {message}")]
    Transport { message: String, reply: Box<Reply> },

    /// The server answered with a status >= 400.
    #[error("{reason}")]
    HttpStatus {
        status: u16,
        reason: String,
        reply: Box<Reply>,
    },

    // === Backend Errors ===
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Object has {count} unresolved siblings")]
    UnresolvedSiblings { count: usize },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Best-effort reply attached to the failure, if any.
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Error::Transport { reply, .. } | Error::HttpStatus { reply, .. } => Some(reply),
            _ => None,
        }
    }

    /// Status code of the attached reply
    pub fn status_code(&self) -> Option<u16> {
        self.reply().map(|r| r.status_code)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::HttpStatus { status: 404, .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::MalformedResponse(e.to_string())
    }
}
