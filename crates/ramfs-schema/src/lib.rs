//! Package metadata, identifiers, and build configuration for ramfs.
//!
//! This crate defines the schema layer: the `Package` model decoded from the
//! Go tool's `go list -json` output, the `Provenance` split between the
//! toolchain tree and the user tree, string newtypes (`ImportPath`,
//! `ArchiveDigest`), and TOML build configuration (`BuildConfig`) with its
//! resolution into a concrete `AssemblyConfig`.

pub mod config;
pub mod package;
pub mod types;

pub use config::{
    default_output, host_goarch, parse_config_file, parse_config_str, ArchiveSection,
    AssemblyConfig, BuildConfig, ConfigError, EnvDefaults, GoSection, PackagesSection,
    ScratchSection, DEFAULT_CONFIG_FILE, DEFAULT_INIT_PACKAGE, DEFAULT_PACKAGE_PATTERN,
};
pub use package::{Package, Provenance};
pub use types::{ArchiveDigest, ImportPath};
