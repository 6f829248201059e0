use serde_json::Value;

use crate::context::InvocationContext;
use crate::error::{ExecutorError, HandlerFailure};
use crate::handler::Handler;

/// Run a resolved handler once and return its value.
///
/// Suspending handlers are driven on a current-thread scheduler created for
/// this call alone. It is dropped before returning, whether the handler
/// succeeded or failed, so nothing scheduled by one invocation can survive
/// into the next.
pub fn dispatch(
    handler: &mut Handler,
    event: Value,
    context: &InvocationContext,
) -> Result<Value, ExecutorError> {
    match handler {
        Handler::Immediate(call) => Ok(call.call(event, context)?),
        Handler::Suspending(call) => {
            let scheduler = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    HandlerFailure::new(format!("failed to start invocation scheduler: {}", err))
                })?;
            let result = scheduler.block_on(call.call(event, context));
            drop(scheduler);
            Ok(result?)
        }
    }
}
