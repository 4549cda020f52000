use crate::types::ImportPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which source root a package's files are read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// The Go toolchain tree (GOROOT).
    SystemRoot,
    /// The user's own source tree (GOPATH).
    UserTree,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::SystemRoot => f.write_str("system-root"),
            Provenance::UserTree => f.write_str("user-tree"),
        }
    }
}

/// Build metadata for one package, as reported by `go list -json`.
///
/// Field names follow the Go tool's JSON output so the struct can be decoded
/// directly; fields the builder does not use are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    pub import_path: ImportPath,
    #[serde(default)]
    pub dir: PathBuf,
    #[serde(default)]
    pub goroot: bool,
    #[serde(default)]
    pub standard: bool,
    #[serde(default)]
    pub go_files: Vec<String>,
    #[serde(default, rename = "SFiles")]
    pub s_files: Vec<String>,
    #[serde(default, rename = "HFiles")]
    pub h_files: Vec<String>,
    #[serde(default)]
    pub deps: Vec<ImportPath>,
}

impl Package {
    pub fn new(import_path: impl Into<ImportPath>, provenance: Provenance) -> Self {
        Self {
            import_path: import_path.into(),
            goroot: provenance == Provenance::SystemRoot,
            standard: provenance == Provenance::SystemRoot,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_go_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.go_files.extend(files.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ImportPath>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn provenance(&self) -> Provenance {
        if self.goroot {
            Provenance::SystemRoot
        } else {
            Provenance::UserTree
        }
    }

    /// Source files in build order: Go files, then assembly, then headers.
    pub fn source_files(&self) -> impl Iterator<Item = &str> {
        self.go_files
            .iter()
            .chain(&self.s_files)
            .chain(&self.h_files)
            .map(String::as_str)
    }

    /// Paths of this package's source files relative to its owning root,
    /// i.e. `src/<import path>/<file>`.
    pub fn root_relative_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.source_files()
            .map(|f| PathBuf::from("src").join(&self.import_path).join(f))
    }
}
