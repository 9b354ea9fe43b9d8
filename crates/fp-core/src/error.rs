use crate::span::Span;
use std::result;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("array length mismatch: destination has {dst_len} elements, source has {src_len}")]
    LengthMismatch {
        span: Span,
        dst_len: u64,
        src_len: u64,
    },
    #[error("cannot reinterpret {bytes} bytes as elements of size {elem_size}")]
    LengthMisalignment {
        span: Span,
        bytes: u64,
        elem_size: u64,
    },
    #[error("invalid code point {code_point:#x}")]
    InvalidCodePoint { span: Span, code_point: u32 },
    #[error("{message}")]
    Lowering { span: Span, message: String },
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::LengthMismatch { span, .. }
            | Error::LengthMisalignment { span, .. }
            | Error::InvalidCodePoint { span, .. }
            | Error::Lowering { span, .. } => Some(*span),
            Error::Generic(_) => None,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::LengthMismatch { .. } => Some("E-ARRAY-LEN"),
            Error::LengthMisalignment { .. } => Some("E-ARRAY-CAST"),
            Error::InvalidCodePoint { .. } => Some("E-ARRAY-UTF"),
            Error::Lowering { .. } | Error::Generic(_) => None,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
