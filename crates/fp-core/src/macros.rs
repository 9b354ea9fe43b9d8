/// Abort on an internal compiler error. Reserved for states the frontend
/// guarantees never reach lowering (unmapped types, malformed IR).
#[macro_export]
macro_rules! bug {
    ($($arg:tt)*) => {
        panic!("internal compiler error: {}", format_args!($($arg)*))
    };
}

/// Return early with a lowering error attributed to `span`.
#[macro_export]
macro_rules! bail_lowering {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::Lowering {
            span: $span,
            message: format!($($arg)*),
        })
    };
}

/// Log a warning message
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::tracing::warn!($($arg)*)
    };
}

/// Log a debug message
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::tracing::debug!($($arg)*)
    };
}

/// Log a trace message
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::tracing::trace!($($arg)*)
    };
}
