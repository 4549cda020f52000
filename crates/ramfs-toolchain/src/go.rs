use crate::backend::{BuildRequest, GoEnv, Toolchain};
use crate::ToolchainError;
use ramfs_schema::Package;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, trace};

/// Drives the `go` command in GOPATH mode with cgo disabled.
pub struct GoToolchain {
    go: PathBuf,
    env: GoEnv,
}

impl GoToolchain {
    pub fn new(env: GoEnv) -> Self {
        Self::with_binary("go", env)
    }

    pub fn with_binary(go: impl Into<PathBuf>, env: GoEnv) -> Self {
        Self {
            go: go.into(),
            env,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.go);
        cmd.env("CGO_ENABLED", "0")
            .env("GO111MODULE", "off")
            .env("GOROOT", &self.env.goroot)
            .env("GOPATH", &self.env.gopath)
            .env("GOOS", &self.env.goos)
            .env("GOARCH", &self.env.goarch);
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output, ToolchainError> {
        trace!("running {cmd:?}");
        cmd.output().map_err(|source| ToolchainError::Spawn {
            program: self.go.display().to_string(),
            source,
        })
    }
}

/// Arguments for a static, stripped, fully rebuilt binary.
pub fn build_args(request: &BuildRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "build".into(),
        "-x".into(),
        "-a".into(),
        "-o".into(),
        request.output.display().to_string(),
        "-installsuffix".into(),
        "cgo".into(),
        "-ldflags".into(),
        "-s -w".into(),
    ];
    args.extend(request.extra_args.iter().cloned());
    if let Some(pkg) = &request.package {
        args.push(pkg.clone());
    }
    args
}

fn combined_output(output: &Output) -> String {
    let mut s = String::from_utf8_lossy(&output.stdout).into_owned();
    s.push_str(&String::from_utf8_lossy(&output.stderr));
    s
}

impl Toolchain for GoToolchain {
    fn name(&self) -> &str {
        "go"
    }

    fn available(&self) -> bool {
        let mut cmd = Command::new(&self.go);
        cmd.arg("version");
        matches!(cmd.output(), Ok(o) if o.status.success())
    }

    fn build(&self, request: &BuildRequest) -> Result<(), ToolchainError> {
        debug!("go build {} -> {}", request.label(), request.output.display());
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = self.command();
        cmd.args(build_args(request));
        if let Some(dir) = &request.workdir {
            cmd.current_dir(dir);
        }

        let output = self.run(cmd)?;
        if !output.status.success() {
            return Err(ToolchainError::BuildFailed {
                package: request.label(),
                output: combined_output(&output),
                detail: output.status.to_string(),
            });
        }
        Ok(())
    }

    fn list_package(&self, import_path: &str) -> Result<Package, ToolchainError> {
        let mut cmd = self.command();
        cmd.args(["list", "-json", import_path]);

        let output = self.run(cmd)?;
        if !output.status.success() {
            return Err(ToolchainError::PackageLookup {
                import_path: import_path.to_owned(),
                detail: combined_output(&output).trim().to_owned(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ToolchainError::PackageLookup {
            import_path: import_path.to_owned(),
            detail: format!("invalid go list output: {e}"),
        })
    }
}

/// Ask a `go` binary for its GOROOT. Returns `None` if it cannot be run.
pub fn detect_goroot(go: &Path) -> Option<PathBuf> {
    let output = Command::new(go).args(["env", "GOROOT"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if root.is_empty() {
        None
    } else {
        Some(PathBuf::from(root))
    }
}
