use std::fmt;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::error::ExecutorError;
use crate::handler::Handler;
use crate::loader::{Loader, MaterializedUnit};

/// `<module-reference>.<function-name>`, split on the last separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub module: String,
    pub function: String,
}

impl EntryPoint {
    pub fn parse(descriptor: &str) -> Result<Self, ExecutorError> {
        match descriptor.rsplit_once('.') {
            Some((module, function)) if !module.is_empty() && !function.is_empty() => Ok(Self {
                module: module.to_string(),
                function: function.to_string(),
            }),
            _ => Err(ExecutorError::InvalidHandlerFormat(descriptor.to_string())),
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.function)
    }
}

/// Turns source text and an entry-point descriptor into a [`Handler`].
///
/// The source is written to a fixed file inside the function directory before
/// the loader sees it. Only one function is active per process, so every
/// resolution overwrites the previous unit; the file stays on disk for
/// diagnostics.
pub struct Resolver {
    function_dir: PathBuf,
    loader: Box<dyn Loader>,
    resolutions: u64,
}

impl Resolver {
    pub fn new(function_dir: impl Into<PathBuf>, loader: Box<dyn Loader>) -> Self {
        Self {
            function_dir: function_dir.into(),
            loader,
            resolutions: 0,
        }
    }

    pub fn function_dir(&self) -> &Path {
        &self.function_dir
    }

    pub fn loader_name(&self) -> &'static str {
        self.loader.name()
    }

    /// Location the source is materialized to.
    pub fn unit_path(&self) -> PathBuf {
        self.function_dir.join(self.loader.unit_file_name())
    }

    /// Number of resolutions attempted, successful or not.
    pub fn resolutions(&self) -> u64 {
        self.resolutions
    }

    pub fn prepare(&mut self, env: &Environment) -> Result<(), ExecutorError> {
        self.loader.prepare(env)
    }

    pub fn resolve(&mut self, source: &str, descriptor: &str) -> Result<Handler, ExecutorError> {
        self.resolutions += 1;
        let entry = EntryPoint::parse(descriptor)?;
        let unit = self.materialize(source)?;
        tracing::debug!(
            "resolving {} from {} via {} loader",
            entry,
            unit.path.display(),
            self.loader.name()
        );
        self.loader.load(&unit, &entry)
    }

    fn materialize(&self, source: &str) -> Result<MaterializedUnit, ExecutorError> {
        let path = self.unit_path();
        let to_error = |source| ExecutorError::Materialize {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.function_dir).map_err(to_error)?;
        std::fs::write(&path, source).map_err(to_error)?;
        Ok(MaterializedUnit { path: path.clone() })
    }
}
