//! Source-based handlers running on an embedded V8 isolate.
//!
//! One `JsRuntime` lives for the whole process, like an interpreter. Each new
//! code revision is imported as a fresh side module so that a changed source
//! never observes the previous module instance. The runtime is `!Send`; the
//! loader and every handler it produces must stay on the thread that created
//! them.

use std::cell::RefCell;
use std::rc::Rc;

use deno_core::{
    JsRuntime, ModuleCodeString, ModuleId, ModuleSpecifier, OpState, PollEventLoopOptions,
    RuntimeOptions, op2, serde_v8, v8,
};
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use serde::Deserialize;
use serde_json::Value;

use crate::context::InvocationContext;
use crate::env::Environment;
use crate::error::{ExecutorError, HandlerFailure};
use crate::handler::{Handler, HandlerKind, HandlerResult, ImmediateCall, SuspendingCall};
use crate::loader::{FunctionModuleLoader, Loader, MaterializedUnit};
use crate::resolver::EntryPoint;

const BOOTSTRAP: &str = include_str!("bootstrap.js");
const APPLY_ENV: &str = "globalThis.__impuls.setEnv(globalThis.__impulsEnv)";
const INVOKE_IMMEDIATE: &str = "globalThis.__impuls.invoke()";
const INVOKE_SUSPENDING: &str = "globalThis.__impuls.invokeAsync()";

deno_core::extension!(impuls_runtime, ops = [op_impuls_remaining_time_millis]);

/// Live remaining budget of the invocation currently running.
#[op2(fast)]
fn op_impuls_remaining_time_millis(state: &mut OpState) -> f64 {
    state
        .try_borrow::<InvocationContext>()
        .map(|context| context.remaining_time_millis() as f64)
        .unwrap_or(0.0)
}

pub struct ScriptLoader {
    runtime: Rc<RefCell<JsRuntime>>,
    revision: u64,
    applied_env: Option<Environment>,
}

impl ScriptLoader {
    pub fn new() -> Result<Self, ExecutorError> {
        let module_loader: Rc<dyn deno_core::ModuleLoader> = Rc::new(FunctionModuleLoader);
        let mut runtime = JsRuntime::new(RuntimeOptions {
            extensions: vec![impuls_runtime::init()],
            module_loader: Some(module_loader),
            ..Default::default()
        });
        runtime
            .execute_script(
                "impuls:bootstrap",
                ModuleCodeString::from(BOOTSTRAP.to_string()),
            )
            .map_err(|err| ExecutorError::ModuleLoad(format!("runtime bootstrap failed: {}", err)))?;

        Ok(Self {
            runtime: Rc::new(RefCell::new(runtime)),
            revision: 0,
            applied_env: None,
        })
    }
}

impl Loader for ScriptLoader {
    fn name(&self) -> &'static str {
        "script"
    }

    fn unit_file_name(&self) -> &'static str {
        "function.js"
    }

    fn prepare(&mut self, env: &Environment) -> Result<(), ExecutorError> {
        if self.applied_env.as_ref() == Some(env) {
            return Ok(());
        }
        let mut runtime = self.runtime.borrow_mut();
        set_global(&mut runtime, "__impulsEnv", env.vars()).map_err(ExecutorError::ModuleLoad)?;
        runtime
            .execute_script("impuls:env", ModuleCodeString::from(APPLY_ENV.to_string()))
            .map_err(|err| ExecutorError::ModuleLoad(format!("failed to apply environment: {}", err)))?;
        self.applied_env = Some(env.clone());
        Ok(())
    }

    fn load(
        &mut self,
        unit: &MaterializedUnit,
        entry: &EntryPoint,
    ) -> Result<Handler, ExecutorError> {
        self.revision += 1;
        let invalid_path =
            || ExecutorError::ModuleLoad(format!("invalid module path {}", unit.path.display()));
        let path = std::path::absolute(&unit.path).map_err(|_| invalid_path())?;
        let mut specifier = ModuleSpecifier::from_file_path(&path).map_err(|_| invalid_path())?;
        specifier.set_query(Some(&format!("revision={}", self.revision)));

        let scheduler = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| {
                ExecutorError::ModuleLoad(format!("failed to start module scheduler: {}", err))
            })?;
        let module_id = scheduler.block_on(evaluate_module(&self.runtime, &specifier));
        drop(scheduler);
        let module_id = module_id?;

        let (function, kind) = {
            let mut runtime = self.runtime.borrow_mut();
            let namespace = runtime.get_module_namespace(module_id).map_err(|err| {
                ExecutorError::ModuleLoad(format!("Failed to get module namespace: {}", err))
            })?;
            lookup_export(&mut runtime, &namespace, &entry.function)?
        };
        tracing::debug!(
            "script handler {} resolved as {} (revision {})",
            entry,
            kind,
            self.revision
        );

        let script = ScriptFunction {
            function,
            runtime: Rc::clone(&self.runtime),
        };
        Ok(match kind {
            HandlerKind::Immediate => Handler::Immediate(Box::new(script)),
            HandlerKind::Suspending => Handler::Suspending(Box::new(script)),
        })
    }
}

async fn evaluate_module(
    runtime: &RefCell<JsRuntime>,
    specifier: &ModuleSpecifier,
) -> Result<ModuleId, ExecutorError> {
    let mut runtime = runtime.borrow_mut();
    let module_id = runtime
        .load_side_es_module(specifier)
        .await
        .map_err(|err| ExecutorError::ModuleLoad(err.to_string()))?;
    let evaluation = runtime.mod_evaluate(module_id);
    runtime
        .run_event_loop(PollEventLoopOptions::default())
        .await
        .map_err(|err| ExecutorError::ModuleLoad(format!("Module event loop failed: {}", err)))?;
    evaluation
        .await
        .map_err(|err| ExecutorError::ModuleLoad(format!("Module evaluation failed: {}", err)))?;
    Ok(module_id)
}

fn lookup_export(
    runtime: &mut JsRuntime,
    namespace: &v8::Global<v8::Object>,
    name: &str,
) -> Result<(v8::Global<v8::Function>, HandlerKind), ExecutorError> {
    deno_core::scope!(scope, runtime);
    let namespace = v8::Local::new(scope, namespace);
    let key = v8::String::new(scope, name)
        .ok_or_else(|| ExecutorError::ModuleLoad("failed to allocate export name".to_string()))?;
    let value = match namespace.get(scope, key.into()) {
        Some(value) if !value.is_undefined() => value,
        _ => return Err(ExecutorError::HandlerNotFound(name.to_string())),
    };
    let kind = if value.is_async_function() {
        HandlerKind::Suspending
    } else {
        HandlerKind::Immediate
    };
    let function = v8::Local::<v8::Function>::try_from(value)
        .map_err(|_| ExecutorError::HandlerNotCallable(name.to_string()))?;
    Ok((v8::Global::new(scope, function), kind))
}

fn set_global<T: serde::Serialize + ?Sized>(
    runtime: &mut JsRuntime,
    name: &str,
    value: &T,
) -> Result<(), String> {
    deno_core::scope!(scope, runtime);
    let context = scope.get_current_context();
    let global = context.global(scope);
    let key = v8::String::new(scope, name).ok_or_else(|| format!("{} key", name))?;
    let value = serde_v8::to_v8(scope, value).map_err(|err| format!("{} to v8: {}", name, err))?;
    global.set(scope, key.into(), value);
    Ok(())
}

/// An exported function plus the runtime it lives in.
struct ScriptFunction {
    // Dropped before the runtime handle.
    function: v8::Global<v8::Function>,
    runtime: Rc<RefCell<JsRuntime>>,
}

impl ScriptFunction {
    fn install(
        &self,
        runtime: &mut JsRuntime,
        event: &Value,
        context: &InvocationContext,
    ) -> Result<(), HandlerFailure> {
        runtime.op_state().borrow_mut().put(context.clone());
        set_global(runtime, "__impulsEvent", event).map_err(HandlerFailure::new)?;
        set_global(runtime, "__impulsContext", &context.descriptor()).map_err(HandlerFailure::new)?;

        deno_core::scope!(scope, runtime);
        let global = scope.get_current_context().global(scope);
        let key = v8::String::new(scope, "__impulsTarget")
            .ok_or_else(|| HandlerFailure::new("__impulsTarget key"))?;
        let target = v8::Local::new(scope, &self.function);
        global.set(scope, key.into(), target.into());
        Ok(())
    }
}

impl ImmediateCall for ScriptFunction {
    fn call(&mut self, event: Value, context: &InvocationContext) -> HandlerResult {
        let mut runtime = self.runtime.borrow_mut();
        self.install(&mut runtime, &event, context)?;
        let result = runtime
            .execute_script(
                "impuls:invoke",
                ModuleCodeString::from(INVOKE_IMMEDIATE.to_string()),
            )
            .map_err(|err| HandlerFailure::new(format!("Handler execution failed: {}", err)))?;
        // A plain function may still hand back a promise.
        if is_pending(&mut runtime, &result) {
            drive_event_loop(&mut runtime)?;
        }
        settle(&mut runtime, result)
    }
}

fn is_pending(runtime: &mut JsRuntime, result: &v8::Global<v8::Value>) -> bool {
    deno_core::scope!(scope, runtime);
    let local = v8::Local::new(scope, result);
    v8::Local::<v8::Promise>::try_from(local)
        .map(|promise| matches!(promise.state(), v8::PromiseState::Pending))
        .unwrap_or(false)
}

fn drive_event_loop(runtime: &mut JsRuntime) -> Result<(), HandlerFailure> {
    let scheduler = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| HandlerFailure::new(format!("failed to start event loop: {}", err)))?;
    scheduler
        .block_on(runtime.run_event_loop(PollEventLoopOptions::default()))
        .map_err(|err| HandlerFailure::new(format!("Event loop failed: {}", err)))
}

impl SuspendingCall for ScriptFunction {
    fn call<'a>(
        &'a mut self,
        event: Value,
        context: &'a InvocationContext,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        async move {
            let mut runtime = self.runtime.borrow_mut();
            self.install(&mut runtime, &event, context)?;
            let pending = runtime
                .execute_script(
                    "impuls:invoke",
                    ModuleCodeString::from(INVOKE_SUSPENDING.to_string()),
                )
                .map_err(|err| HandlerFailure::new(format!("Handler execution failed: {}", err)))?;
            runtime
                .run_event_loop(PollEventLoopOptions::default())
                .await
                .map_err(|err| HandlerFailure::new(format!("Event loop failed: {}", err)))?;
            settle(&mut runtime, pending)
        }
        .boxed_local()
    }
}

/// Envelope produced by the bootstrap's `invoke`/`invokeAsync`.
#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    stack: Option<String>,
}

impl ScriptOutcome {
    fn into_result(self) -> HandlerResult {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "Unknown error".to_string());
        let stack = self.stack.unwrap_or_default();
        Err(HandlerFailure::with_stack(message, stack))
    }
}

fn settle(runtime: &mut JsRuntime, result: v8::Global<v8::Value>) -> HandlerResult {
    deno_core::scope!(scope, runtime);
    let local = v8::Local::new(scope, &result);
    let value = if let Ok(promise) = v8::Local::<v8::Promise>::try_from(local) {
        match promise.state() {
            v8::PromiseState::Fulfilled => promise.result(scope),
            v8::PromiseState::Rejected => {
                let reason = promise.result(scope);
                let reason = reason.to_rust_string_lossy(scope);
                return Err(HandlerFailure::with_stack(reason.clone(), reason));
            }
            v8::PromiseState::Pending => {
                return Err(HandlerFailure::new(
                    "Handler promise still pending after event loop",
                ));
            }
        }
    } else {
        local
    };

    let outcome: ScriptOutcome = serde_v8::from_v8(scope, value).map_err(|err| {
        HandlerFailure::new(format!("Handler returned non-serializable result: {}", err))
    })?;
    outcome.into_result()
}
