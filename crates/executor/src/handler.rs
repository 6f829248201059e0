use std::fmt;

use futures_util::future::LocalBoxFuture;
use serde_json::Value;

use crate::context::InvocationContext;
use crate::error::HandlerFailure;

pub type HandlerResult = Result<Value, HandlerFailure>;

/// A handler that returns its result from the call itself.
pub trait ImmediateCall {
    fn call(&mut self, event: Value, context: &InvocationContext) -> HandlerResult;
}

/// A handler that yields a future which must be driven to completion.
pub trait SuspendingCall {
    fn call<'a>(
        &'a mut self,
        event: Value,
        context: &'a InvocationContext,
    ) -> LocalBoxFuture<'a, HandlerResult>;
}

/// Resolved entry point, tagged with its execution model at resolution time.
pub enum Handler {
    Immediate(Box<dyn ImmediateCall>),
    Suspending(Box<dyn SuspendingCall>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Immediate,
    Suspending,
}

impl Handler {
    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Immediate(_) => HandlerKind::Immediate,
            Self::Suspending(_) => HandlerKind::Suspending,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("immediate"),
            Self::Suspending => f.write_str("suspending"),
        }
    }
}
