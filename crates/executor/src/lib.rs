//! Function executor: resolves source text into a handler, memoizes it and
//! runs it once per invocation.
//!
//! Everything in this crate is single-threaded. Script handlers hold a V8
//! isolate, so a [`resolver::Resolver`], its [`handler::Handler`]s and the
//! [`cache::HandlerCache`] must stay on the thread that created them.

pub mod cache;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod handler;
pub mod loader;
pub mod resolver;

pub use cache::HandlerCache;
pub use context::InvocationContext;
pub use dispatch::dispatch;
pub use env::Environment;
pub use error::{ExecutorError, HandlerFailure};
pub use handler::{Handler, HandlerKind, HandlerResult, ImmediateCall, SuspendingCall};
pub use loader::{Loader, NativeLoader, NativeModule, ScriptLoader};
pub use resolver::{EntryPoint, Resolver};
