pub mod build;
pub mod completions;
pub mod list;
pub mod man_pages;
pub mod resolve;

use indicatif::{ProgressBar, ProgressStyle};
use ramfs_schema::{parse_config_file, AssemblyConfig, BuildConfig, EnvDefaults, DEFAULT_CONFIG_FILE};
use ramfs_toolchain::{detect_goroot, select_toolchain, GoEnv, Toolchain};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_ARCHIVE_ERROR: u8 = 3;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub patterns: Vec<String>,
    pub use_existing_init: bool,
    pub initial_cpio: Option<PathBuf>,
    pub tmpdir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub toolchain: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut BuildConfig) {
        if !self.patterns.is_empty() {
            config.packages.patterns = self.patterns;
        }
        if self.use_existing_init {
            config.archive.use_existing_init = true;
        }
        if self.initial_cpio.is_some() {
            config.archive.initial_cpio = self.initial_cpio;
        }
        if self.tmpdir.is_some() {
            config.scratch.tmpdir = self.tmpdir;
        }
        if self.output.is_some() {
            config.archive.output = self.output;
        }
        if let Some(toolchain) = self.toolchain {
            config.go.toolchain = toolchain;
        }
    }
}

/// Read `path`, or `ramfs.toml` in the working directory if it exists, or
/// fall back to built-in defaults.
pub fn load_build_config(path: Option<&Path>) -> Result<BuildConfig, String> {
    let path = match path {
        Some(p) => p,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Path::new(DEFAULT_CONFIG_FILE),
        None => return Ok(BuildConfig::default()),
    };
    debug!("loading config from {}", path.display());
    parse_config_file(path).map_err(|e| format!("config error: {}: {e}", path.display()))
}

pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<AssemblyConfig, String> {
    let mut config = load_build_config(path)?;
    overrides.apply(&mut config);
    config
        .resolve(&EnvDefaults::from_process_env(), || {
            detect_goroot(Path::new("go"))
        })
        .map_err(|e| format!("config error: {e}"))
}

/// Fail early when the selected toolchain needs tools that are not installed.
pub fn check_prereqs(toolchain: &str) -> Result<(), String> {
    if toolchain != "go" || std::env::var("RAMFS_SKIP_PREREQS").as_deref() == Ok("1") {
        return Ok(());
    }
    let missing = ramfs_toolchain::check_go_prereqs();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ramfs_toolchain::format_missing(&missing))
    }
}

pub fn make_toolchain(config: &AssemblyConfig) -> Result<Box<dyn Toolchain>, String> {
    check_prereqs(&config.toolchain)?;
    select_toolchain(&config.toolchain, &GoEnv::from_config(config))
        .map_err(|e| format!("toolchain error: {e}"))
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .map(|s| s.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

/// Map an error message to the process exit code.
pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("config error:") {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("archive error:") {
        EXIT_ARCHIVE_ERROR
    } else {
        EXIT_FAILURE
    }
}
