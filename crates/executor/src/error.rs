use std::backtrace::Backtrace;
use std::fmt;

/// Failure raised while a handler was running.
///
/// `stack` is the best trace available: the script's own stack for script
/// handlers, a captured backtrace for native ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub message: String,
    pub stack: String,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let stack = format!("{}\n{}", message, Backtrace::force_capture());
        Self { message, stack }
    }

    pub fn with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        let message = message.into();
        let mut stack = stack.into();
        if stack.trim().is_empty() {
            stack = message.clone();
        }
        Self { message, stack }
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerFailure {}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Invalid handler format: {0} (expected 'module.function')")]
    InvalidHandlerFormat(String),

    #[error("Handler '{0}' not found in module")]
    HandlerNotFound(String),

    #[error("Handler '{0}' is not callable")]
    HandlerNotCallable(String),

    #[error(transparent)]
    HandlerExecutionFailure(#[from] HandlerFailure),

    #[error("Failed to materialize function code at {path}: {source}")]
    Materialize {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load function module: {0}")]
    ModuleLoad(String),
}

impl ExecutorError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidHandlerFormat(_) => "InvalidHandlerFormat",
            Self::HandlerNotFound(_) => "HandlerNotFound",
            Self::HandlerNotCallable(_) => "HandlerNotCallable",
            Self::HandlerExecutionFailure(_) => "HandlerExecutionFailure",
            Self::Materialize { .. } => "Materialize",
            Self::ModuleLoad(_) => "ModuleLoad",
        }
    }

    /// Human-readable trace for failure outcomes.
    pub fn diagnostic_trace(&self) -> String {
        if let Self::HandlerExecutionFailure(failure) = self {
            return failure.stack.clone();
        }
        let mut trace = format!("{}: {}", self.kind(), self);
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            trace.push_str(&format!("\n  caused by: {}", err));
            source = err.source();
        }
        trace.push('\n');
        trace.push_str(&Backtrace::force_capture().to_string());
        trace
    }
}
