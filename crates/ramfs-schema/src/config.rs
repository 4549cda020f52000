use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default seed pattern, relative to GOPATH.
pub const DEFAULT_PACKAGE_PATTERN: &str = "src/github.com/u-root/u-root/cmds/[a-zA-Z]*";
/// Default import path of the init program.
pub const DEFAULT_INIT_PACKAGE: &str = "github.com/u-root/u-root/cmds/init";
/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ramfs.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported config_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("GOPATH is not set (set go.gopath in the config or export GOPATH, typically ~/go)")]
    MissingGopath,
    #[error("GOROOT is not set and could not be detected")]
    MissingGoroot,
    #[error("invalid package pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default = "default_version")]
    pub config_version: u32,
    #[serde(default)]
    pub go: GoSection,
    #[serde(default)]
    pub packages: PackagesSection,
    #[serde(default)]
    pub archive: ArchiveSection,
    #[serde(default)]
    pub scratch: ScratchSection,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            config_version: default_version(),
            go: GoSection::default(),
            packages: PackagesSection::default(),
            archive: ArchiveSection::default(),
            scratch: ScratchSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GoSection {
    #[serde(default)]
    pub goroot: Option<PathBuf>,
    #[serde(default)]
    pub gopath: Option<PathBuf>,
    #[serde(default)]
    pub goarch: Option<String>,
    #[serde(default = "default_goos")]
    pub goos: String,
    #[serde(default = "default_toolchain")]
    pub toolchain: String,
}

impl Default for GoSection {
    fn default() -> Self {
        Self {
            goroot: None,
            gopath: None,
            goarch: None,
            goos: default_goos(),
            toolchain: default_toolchain(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackagesSection {
    /// Glob patterns relative to GOPATH. Empty means the default command set.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_init")]
    pub init: String,
    /// Directories under GOROOT written recursively below `go/`.
    #[serde(default = "default_system_trees")]
    pub system_trees: Vec<PathBuf>,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            init: default_init(),
            system_trees: default_system_trees(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveSection {
    #[serde(default)]
    pub initial_cpio: Option<PathBuf>,
    #[serde(default)]
    pub use_existing_init: bool,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScratchSection {
    #[serde(default)]
    pub tmpdir: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

fn default_goos() -> String {
    "linux".to_owned()
}

fn default_toolchain() -> String {
    "go".to_owned()
}

fn default_init() -> String {
    DEFAULT_INIT_PACKAGE.to_owned()
}

fn default_system_trees() -> Vec<PathBuf> {
    vec![PathBuf::from("pkg/include")]
}

/// Fully resolved settings for one assembly run. Every path is concrete.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssemblyConfig {
    pub goroot: PathBuf,
    pub gopath: PathBuf,
    pub goarch: String,
    pub goos: String,
    pub toolchain: String,
    pub patterns: Vec<String>,
    pub init_package: String,
    pub system_trees: Vec<PathBuf>,
    pub initial_cpio: Option<PathBuf>,
    pub use_existing_init: bool,
    pub output: PathBuf,
    pub tmpdir: Option<PathBuf>,
}

impl AssemblyConfig {
    /// `<goos>_<goarch>`, the toolchain's platform directory name.
    pub fn platform(&self) -> String {
        format!("{}_{}", self.goos, self.goarch)
    }
}

/// Values taken from the process environment when the config leaves them unset.
#[derive(Debug, Clone, Default)]
pub struct EnvDefaults {
    pub goroot: Option<PathBuf>,
    pub gopath: Option<PathBuf>,
    pub goarch: Option<String>,
}

impl EnvDefaults {
    pub fn from_process_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            goroot: var("GOROOT").map(PathBuf::from),
            gopath: var("GOPATH").map(PathBuf::from),
            goarch: var("GOARCH"),
        }
    }
}

impl BuildConfig {
    /// Resolve into an [`AssemblyConfig`]. `detect_goroot` is consulted only
    /// when neither the config nor the environment names a GOROOT.
    pub fn resolve(
        &self,
        env: &EnvDefaults,
        detect_goroot: impl FnOnce() -> Option<PathBuf>,
    ) -> Result<AssemblyConfig, ConfigError> {
        if self.config_version != 1 {
            return Err(ConfigError::UnsupportedVersion(self.config_version));
        }

        let gopath = self
            .go
            .gopath
            .clone()
            .or_else(|| env.gopath.clone())
            .ok_or(ConfigError::MissingGopath)?;

        let goroot = match self.go.goroot.clone().or_else(|| env.goroot.clone()) {
            Some(root) => root,
            None => detect_goroot().ok_or(ConfigError::MissingGoroot)?,
        };

        let goarch = self
            .go
            .goarch
            .clone()
            .or_else(|| env.goarch.clone())
            .unwrap_or_else(|| host_goarch().to_owned());
        let goos = self.go.goos.trim().to_owned();

        let output = self
            .archive
            .output
            .clone()
            .unwrap_or_else(|| default_output(&goos, &goarch));

        Ok(AssemblyConfig {
            goroot: clean(&goroot),
            gopath: clean(&gopath),
            goarch,
            goos,
            toolchain: self.go.toolchain.trim().to_lowercase(),
            patterns: self.packages.patterns.clone(),
            init_package: self.packages.init.clone(),
            system_trees: self.packages.system_trees.clone(),
            initial_cpio: self.archive.initial_cpio.clone(),
            use_existing_init: self.archive.use_existing_init,
            output,
            tmpdir: self.scratch.tmpdir.clone(),
        })
    }
}

/// `/tmp/initramfs.<goos>_<goarch>.cpio`
pub fn default_output(goos: &str, goarch: &str) -> PathBuf {
    std::env::temp_dir().join(format!("initramfs.{goos}_{goarch}.cpio"))
}

/// GOARCH name of the host this binary was compiled for.
pub fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

fn clean(path: &Path) -> PathBuf {
    path.components().collect()
}

pub fn parse_config_str(input: &str) -> Result<BuildConfig, ConfigError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<BuildConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
