//! Assembly orchestration for ramfs.
//!
//! This crate ties together configuration, the toolchain service, and the
//! archive composer into the `Assembler`: expand seed patterns, compute the
//! dependency closure of the seed packages, build the toolchain and init
//! binaries into a scoped scratch directory, and stream everything into one
//! reproducible newc archive.

pub mod assembly;
pub mod closure;
pub mod concurrency;
pub mod scratch;
pub mod seeds;

pub use assembly::{Assembler, AssemblyReport};
pub use closure::{ClosureResolver, Manifests, OrderedSet};
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use scratch::ScratchDir;
pub use seeds::expand_patterns;

use ramfs_schema::ImportPath;
use ramfs_toolchain::ToolchainError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] ramfs_schema::ConfigError),
    #[error("archive error: {0}")]
    Archive(#[from] ramfs_archive::ArchiveError),
    #[error("toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),
    #[error("cannot resolve dependency {import_path}: {source}")]
    FatalClosure {
        import_path: ImportPath,
        #[source]
        source: ToolchainError,
    },
    #[error("seed archive {}: {source}", path.display())]
    SeedArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("interrupted")]
    Interrupted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
