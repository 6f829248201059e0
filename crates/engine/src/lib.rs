pub mod config;
pub mod engine;
pub mod envelope;
pub mod outcome;
pub mod worker;

pub use config::RuntimeConfig;
pub use engine::ExecutionEngine;
pub use envelope::{InvocationRequest, ResponseEnvelope};
pub use outcome::{Failure, InvocationOutcome};
pub use worker::EngineHandle;
