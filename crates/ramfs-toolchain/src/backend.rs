use crate::ToolchainError;
use ramfs_schema::{AssemblyConfig, Package};
use serde::Serialize;
use std::path::PathBuf;

/// One request to produce a static executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRequest {
    /// Package to build. `None` builds the package in `workdir`.
    pub package: Option<String>,
    pub workdir: Option<PathBuf>,
    pub output: PathBuf,
    pub extra_args: Vec<String>,
}

impl BuildRequest {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            package: None,
            workdir: None,
            output: output.into(),
            extra_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Human-readable name of what is being built, for logs and errors.
    pub fn label(&self) -> String {
        match (&self.package, &self.workdir) {
            (Some(p), _) if p != "." => p.clone(),
            (_, Some(dir)) => dir.display().to_string(),
            (Some(p), None) => p.clone(),
            (None, None) => ".".to_owned(),
        }
    }
}

/// Go environment a toolchain operates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoEnv {
    pub goroot: PathBuf,
    pub gopath: PathBuf,
    pub goos: String,
    pub goarch: String,
}

impl GoEnv {
    pub fn from_config(config: &AssemblyConfig) -> Self {
        Self {
            goroot: config.goroot.clone(),
            gopath: config.gopath.clone(),
            goos: config.goos.clone(),
            goarch: config.goarch.clone(),
        }
    }
}

/// The compiler service: builds static executables and reports package
/// metadata. Calls block until the underlying tool finishes.
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Build one static executable at `request.output`.
    fn build(&self, request: &BuildRequest) -> Result<(), ToolchainError>;

    /// Query build metadata for one import path. Querying the same path
    /// twice yields the same result.
    fn list_package(&self, import_path: &str) -> Result<Package, ToolchainError>;
}

pub fn select_toolchain(name: &str, env: &GoEnv) -> Result<Box<dyn Toolchain>, ToolchainError> {
    match name {
        "go" => Ok(Box::new(crate::go::GoToolchain::new(env.clone()))),
        "mock" => Ok(Box::new(crate::mock::MockToolchain::new())),
        other => Err(ToolchainError::Unavailable(other.to_owned())),
    }
}
