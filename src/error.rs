use pthaw_loader::Ack;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThawError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Could not execute loader at {path}: {source}")]
    Spawn { path: String, source: io::Error },

    #[error("Unexpected response from loader: expected {expected}, received {received}")]
    UnexpectedAck { expected: Ack, received: u8 },

    #[error("Loader closed its response channel while {expected} was expected")]
    ChannelClosed { expected: Ack },

    #[error("Invalid region {spec:?}: {reason}")]
    InvalidRegion { spec: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ThawError>;
