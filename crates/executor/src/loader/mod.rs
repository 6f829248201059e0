//! Loaders turn a materialized unit into a callable [`Handler`].
//!
//! The resolver owns parsing and materialization; a loader only performs the
//! single lookup of a named entry point inside the unit it is given.

mod module_loader;
pub mod native;
pub mod script;

use std::path::PathBuf;

pub use module_loader::FunctionModuleLoader;
pub use native::{NativeExport, NativeLoader, NativeModule};
pub use script::ScriptLoader;

use crate::env::Environment;
use crate::error::ExecutorError;
use crate::handler::Handler;
use crate::resolver::EntryPoint;

/// Function code written to the well-known location.
#[derive(Debug, Clone)]
pub struct MaterializedUnit {
    pub path: PathBuf,
}

pub trait Loader {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// File name of the unit inside the function directory.
    fn unit_file_name(&self) -> &'static str;

    /// Make the environment visible to code loaded or run from here on.
    fn prepare(&mut self, _env: &Environment) -> Result<(), ExecutorError> {
        Ok(())
    }

    fn load(
        &mut self,
        unit: &MaterializedUnit,
        entry: &EntryPoint,
    ) -> Result<Handler, ExecutorError>;
}
