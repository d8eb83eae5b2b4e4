use std::fmt;

use thiserror::Error;

/// The argument an `InvalidArgument` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Host,
    Port,
    StartPort,
    EndPort,
    SocketTimeout,
    PoolSize,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Host => "host",
            Field::Port => "port",
            Field::StartPort => "start port",
            Field::EndPort => "end port",
            Field::SocketTimeout => "socket timeout",
            Field::PoolSize => "pool size",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: Field, reason: String },
    #[error("task was discarded by a pool shutdown")]
    Cancelled,
    #[error("pooled task panicked")]
    TaskPanicked,
}

impl ScanError {
    pub fn invalid(field: Field, reason: impl Into<String>) -> Self {
        ScanError::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// The offending field, if this is a validation error.
    pub fn field(&self) -> Option<Field> {
        match self {
            ScanError::InvalidArgument { field, .. } => Some(*field),
            _ => None,
        }
    }
}
