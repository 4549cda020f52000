//! Compiler service backends for ramfs.
//!
//! This crate implements the toolchain layer: the pluggable `Toolchain` trait
//! (build a static executable, query package metadata), the `GoToolchain`
//! backend that drives `go build` and `go list -json`, an in-memory
//! `MockToolchain` for tests, and prerequisite checking.

pub mod backend;
pub mod go;
pub mod mock;
pub mod prereq;

pub use backend::{select_toolchain, BuildRequest, GoEnv, Toolchain};
pub use go::{detect_goroot, GoToolchain};
pub use mock::MockToolchain;
pub use prereq::{check_go_prereqs, format_missing, MissingPrereq};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("toolchain I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toolchain '{0}' is not available")]
    Unavailable(String),
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot resolve package '{import_path}': {detail}")]
    PackageLookup { import_path: String, detail: String },
    #[error("building statically linked {package}: {detail}\n{output}")]
    BuildFailed {
        package: String,
        output: String,
        detail: String,
    },
}
