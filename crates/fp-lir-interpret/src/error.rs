use fp_core::span::Span;
use thiserror::Error;

/// Why execution stopped before the entry function returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Trap {
    #[error("index {index} out of bounds for length {len} at {span}")]
    BoundsViolation { span: Span, index: u64, len: u64 },
    #[error("array length mismatch: {dst_len} != {src_len} at {span}")]
    LengthMismatch {
        span: Span,
        dst_len: u64,
        src_len: u64,
    },
    #[error("{bytes} bytes are not a multiple of element size {elem_size} at {span}")]
    CastMisalignment {
        span: Span,
        bytes: u64,
        elem_size: u64,
    },
    #[error("invalid code point {code_point:#x} at {span}")]
    InvalidCodePoint { span: Span, code_point: u32 },
    #[error("reached unreachable code in `{function}` at bb{block}")]
    Unreachable { function: String, block: u32 },
    #[error("memory fault: {0}")]
    Fault(String),
    #[error("host function failed: {0}")]
    Host(String),
    #[error("step limit of {0} instructions exceeded")]
    StepLimit(u64),
}

impl Trap {
    /// Source location reported by a failure hook, if this trap came from one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Trap::BoundsViolation { span, .. }
            | Trap::LengthMismatch { span, .. }
            | Trap::CastMisalignment { span, .. }
            | Trap::InvalidCodePoint { span, .. } => Some(*span),
            _ => None,
        }
    }
}

impl From<eyre::Report> for Trap {
    fn from(err: eyre::Report) -> Self {
        Trap::Host(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Trap>;

/// Return early with a memory fault
#[macro_export]
macro_rules! bail_fault {
    ($($arg:tt)*) => {
        return Err($crate::error::Trap::Fault(format!($($arg)*)))
    };
}

/// Fault unless the condition holds
#[macro_export]
macro_rules! ensure_fault {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail_fault!($($arg)*);
        }
    };
}
