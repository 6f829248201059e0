//! Precompiled handlers: Rust functions registered in-process.
//!
//! The materialized unit is only written for diagnostics; resolution looks the
//! module and function names up in the registry.

use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use serde_json::Value;

use crate::context::InvocationContext;
use crate::error::ExecutorError;
use crate::handler::{Handler, HandlerResult, ImmediateCall, SuspendingCall};
use crate::loader::{Loader, MaterializedUnit};
use crate::resolver::EntryPoint;

type ImmediateFn = Rc<dyn Fn(Value, &InvocationContext) -> HandlerResult>;
type SuspendingFn = Rc<dyn Fn(Value, InvocationContext) -> LocalBoxFuture<'static, HandlerResult>>;

#[derive(Clone)]
pub enum NativeExport {
    Immediate(ImmediateFn),
    Suspending(SuspendingFn),
    /// Exported data; resolving it as a handler fails as not callable.
    Value(Value),
}

#[derive(Clone, Default)]
pub struct NativeModule {
    exports: HashMap<String, NativeExport>,
}

impl NativeModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn immediate<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, &InvocationContext) -> HandlerResult + 'static,
    {
        self.exports
            .insert(name.into(), NativeExport::Immediate(Rc::new(f)));
        self
    }

    pub fn suspending<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, InvocationContext) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        let f: SuspendingFn = Rc::new(
            move |event: Value, context: InvocationContext| -> LocalBoxFuture<'static, HandlerResult> {
                f(event, context).boxed_local()
            },
        );
        self.exports
            .insert(name.into(), NativeExport::Suspending(f));
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.exports.insert(name.into(), NativeExport::Value(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&NativeExport> {
        self.exports.get(name)
    }
}

#[derive(Clone, Default)]
pub struct NativeLoader {
    modules: HashMap<String, NativeModule>,
}

impl NativeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, module: NativeModule) -> Self {
        self.modules.insert(name.into(), module);
        self
    }
}

impl Loader for NativeLoader {
    fn name(&self) -> &'static str {
        "native"
    }

    fn unit_file_name(&self) -> &'static str {
        "function.native"
    }

    fn load(
        &mut self,
        _unit: &MaterializedUnit,
        entry: &EntryPoint,
    ) -> Result<Handler, ExecutorError> {
        let module = self.modules.get(&entry.module).ok_or_else(|| {
            ExecutorError::ModuleLoad(format!("module '{}' is not registered", entry.module))
        })?;
        match module.get(&entry.function) {
            None => Err(ExecutorError::HandlerNotFound(entry.function.clone())),
            Some(NativeExport::Value(_)) => {
                Err(ExecutorError::HandlerNotCallable(entry.function.clone()))
            }
            Some(NativeExport::Immediate(f)) => {
                Ok(Handler::Immediate(Box::new(NativeImmediate(Rc::clone(f)))))
            }
            Some(NativeExport::Suspending(f)) => {
                Ok(Handler::Suspending(Box::new(NativeSuspending(Rc::clone(f)))))
            }
        }
    }
}

struct NativeImmediate(ImmediateFn);

impl ImmediateCall for NativeImmediate {
    fn call(&mut self, event: Value, context: &InvocationContext) -> HandlerResult {
        (self.0)(event, context)
    }
}

struct NativeSuspending(SuspendingFn);

impl SuspendingCall for NativeSuspending {
    fn call<'a>(
        &'a mut self,
        event: Value,
        context: &'a InvocationContext,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        (self.0)(event, context.clone())
    }
}
