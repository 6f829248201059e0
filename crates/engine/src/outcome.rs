use serde_json::Value;

use executor::ExecutorError;

use crate::envelope::ResponseEnvelope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub stack: String,
}

impl Failure {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }
}

impl From<&ExecutorError> for Failure {
    fn from(err: &ExecutorError) -> Self {
        Self {
            message: err.to_string(),
            stack: err.diagnostic_trace(),
        }
    }
}

/// Terminal state of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Ok(Value),
    Error(Failure),
}

impl InvocationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Ok(_) => None,
            Self::Error(failure) => Some(failure),
        }
    }

    pub fn into_response(self) -> ResponseEnvelope {
        match self {
            Self::Ok(value) => ResponseEnvelope::success(value),
            Self::Error(failure) => ResponseEnvelope::failure(failure.message, failure.stack),
        }
    }
}

impl From<Result<Value, ExecutorError>> for InvocationOutcome {
    fn from(result: Result<Value, ExecutorError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) => Self::Error(Failure::from(&err)),
        }
    }
}
