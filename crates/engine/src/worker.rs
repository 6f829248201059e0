use std::panic::AssertUnwindSafe;
use std::thread;

use tokio::sync::{mpsc, oneshot};

use executor::ExecutorError;

use crate::engine::ExecutionEngine;
use crate::envelope::InvocationRequest;
use crate::outcome::{Failure, InvocationOutcome};

enum EngineMessage {
    Invoke {
        request: InvocationRequest,
        response_tx: oneshot::Sender<InvocationOutcome>,
    },
    Stats {
        response_tx: oneshot::Sender<serde_json::Value>,
    },
}

/// Handle to the thread that owns the [`ExecutionEngine`].
///
/// The engine holds a V8 isolate and cannot leave its thread. Requests are
/// queued on a channel and served strictly in order, one at a time. Clones
/// share the same worker; it exits once every handle is dropped.
#[derive(Clone)]
pub struct EngineHandle {
    request_tx: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineHandle {
    /// Start the worker thread and build the engine on it.
    ///
    /// Resolves once the engine exists, or with the factory's error.
    pub async fn spawn<F>(factory: F) -> Result<Self, String>
    where
        F: FnOnce() -> Result<ExecutionEngine, ExecutorError> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

        thread::Builder::new()
            .name("impuls-engine".into())
            .spawn(move || match factory() {
                Ok(engine) => {
                    let _ = ready_tx.send(Ok(()));
                    run(engine, request_rx);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("engine startup failed: {}", err)));
                }
            })
            .map_err(|err| format!("failed to spawn engine thread: {}", err))?;

        ready_rx
            .await
            .map_err(|_| "engine thread exited during startup".to_string())??;
        Ok(Self { request_tx })
    }

    pub async fn invoke(&self, request: InvocationRequest) -> Result<InvocationOutcome, String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(EngineMessage::Invoke {
                request,
                response_tx,
            })
            .map_err(|_| "Engine worker dead".to_string())?;
        response_rx
            .await
            .map_err(|_| "Engine worker dropped the request".to_string())
    }

    pub async fn stats(&self) -> Result<serde_json::Value, String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(EngineMessage::Stats { response_tx })
            .map_err(|_| "Engine worker dead".to_string())?;
        response_rx
            .await
            .map_err(|_| "Engine worker dropped the request".to_string())
    }
}

/// Main loop; runs on the dedicated thread outside any async runtime, so the
/// dispatch bridge is free to start its own scheduler.
fn run(mut engine: ExecutionEngine, mut request_rx: mpsc::UnboundedReceiver<EngineMessage>) {
    tracing::debug!(
        "Engine worker started ({} loader, function dir {})",
        engine.resolver().loader_name(),
        engine.resolver().function_dir().display()
    );

    while let Some(message) = request_rx.blocking_recv() {
        match message {
            EngineMessage::Invoke {
                request,
                response_tx,
            } => {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| engine.invoke(request)))
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        tracing::error!("handler panicked: {}", message);
                        InvocationOutcome::Error(Failure::new(
                            format!("Handler panicked: {}", message),
                            std::backtrace::Backtrace::force_capture().to_string(),
                        ))
                    });
                let _ = response_tx.send(outcome);
            }
            EngineMessage::Stats { response_tx } => {
                let _ = response_tx.send(engine.stats());
            }
        }
    }

    tracing::debug!("Engine worker shutting down");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use executor::{Environment, NativeLoader, NativeModule, Resolver};
    use serde_json::json;

    fn factory(
        dir: std::path::PathBuf,
    ) -> impl FnOnce() -> Result<ExecutionEngine, ExecutorError> + Send + 'static {
        move || {
            let loader = NativeLoader::new().register(
                "handler",
                NativeModule::new()
                    .immediate("handler", |event, _ctx| Ok(json!({"echo": event})))
                    .immediate("panics", |_event, _ctx| panic!("handler exploded")),
            );
            Ok(ExecutionEngine::with_env(
                Resolver::new(dir, Box::new(loader)),
                Environment::default(),
            ))
        }
    }

    #[tokio::test]
    async fn invocations_run_on_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let handle = EngineHandle::spawn(factory(dir.path().to_path_buf()))
            .await
            .unwrap();

        let request = InvocationRequest::new("v1", "handler.handler").with_event(json!(7));
        let outcome = handle.invoke(request.clone()).await.unwrap();
        assert_eq!(outcome, InvocationOutcome::Ok(json!({"echo": 7})));
        handle.invoke(request).await.unwrap();

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats["invocations"], 2);
        assert_eq!(stats["resolutions"], 1);
        assert_eq!(stats["cache"]["cache_hits"], 1);
    }

    #[tokio::test]
    async fn concurrent_callers_are_served_one_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let handle = EngineHandle::spawn(factory(dir.path().to_path_buf()))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    let request =
                        InvocationRequest::new("v1", "handler.handler").with_event(json!(n));
                    (n, handle.invoke(request).await)
                })
            })
            .collect();
        for task in tasks {
            let (n, outcome) = task.await.unwrap();
            assert_eq!(outcome.unwrap(), InvocationOutcome::Ok(json!({"echo": n})));
        }
        assert_eq!(handle.stats().await.unwrap()["resolutions"], 1);
    }

    #[tokio::test]
    async fn panicking_handler_becomes_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let handle = EngineHandle::spawn(factory(dir.path().to_path_buf()))
            .await
            .unwrap();

        let outcome = handle
            .invoke(InvocationRequest::new("v1", "handler.panics"))
            .await
            .unwrap();
        let failure = outcome.failure().unwrap();
        assert!(failure.message.contains("handler exploded"));

        let outcome = handle
            .invoke(InvocationRequest::new("v2", "handler.handler"))
            .await
            .unwrap();
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn factory_error_is_reported() {
        let result =
            EngineHandle::spawn(|| Err(ExecutorError::ModuleLoad("no runtime".into()))).await;
        let err = result.err().unwrap();
        assert!(err.contains("no runtime"));
    }
}
