use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("buffer allocation failed: {0}")]
    Alloc(#[from] TryReserveError),

    #[error("box writer failed: {0}")]
    Writer(String),

    #[error("unbalanced box nesting: {0}")]
    Nesting(String),

    #[error("no sequence parameter set captured yet")]
    MissingParameterSets,

    #[error("invalid format block: {0}")]
    InvalidFormat(String),
}

impl MuxError {
    pub fn writer<T>(t: T) -> Self
    where
        T: ToString,
    {
        MuxError::Writer(t.to_string())
    }

    pub fn invalid_format<T>(t: T) -> Self
    where
        T: ToString,
    {
        MuxError::InvalidFormat(t.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
