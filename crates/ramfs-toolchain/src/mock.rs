use crate::backend::{BuildRequest, Toolchain};
use crate::ToolchainError;
use ramfs_schema::Package;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    builds: Vec<BuildRequest>,
    lookups: Vec<String>,
}

/// In-memory toolchain: packages come from a fixed table and builds write a
/// small marker file instead of compiling anything.
#[derive(Default)]
pub struct MockToolchain {
    packages: HashMap<String, Package>,
    failing_builds: HashSet<String>,
    state: Mutex<MockState>,
}

impl MockToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_package(mut self, package: Package) -> Self {
        self.packages
            .insert(package.import_path.to_string(), package);
        self
    }

    /// Make builds whose [`BuildRequest::label`] equals `label` fail.
    #[must_use]
    pub fn with_failing_build(mut self, label: impl Into<String>) -> Self {
        self.failing_builds.insert(label.into());
        self
    }

    /// Every build request received, in order.
    pub fn builds(&self) -> Vec<BuildRequest> {
        self.state
            .lock()
            .map(|s| s.builds.clone())
            .unwrap_or_default()
    }

    /// Every import path queried, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.lookups.clone())
            .unwrap_or_default()
    }

    pub fn lookup_count(&self, import_path: &str) -> usize {
        self.lookups().iter().filter(|p| *p == import_path).count()
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, MockState>, ToolchainError> {
        self.state
            .lock()
            .map_err(|e| ToolchainError::Unavailable(format!("mock state poisoned: {e}")))
    }
}

impl Toolchain for MockToolchain {
    fn name(&self) -> &str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn build(&self, request: &BuildRequest) -> Result<(), ToolchainError> {
        self.state()?.builds.push(request.clone());

        let label = request.label();
        if self.failing_builds.contains(&label) {
            return Err(ToolchainError::BuildFailed {
                package: label,
                output: "mock: build failed\n".to_owned(),
                detail: "exit status: 1".to_owned(),
            });
        }

        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&request.output, format!("mock-binary:{label}\n"))?;
        Ok(())
    }

    fn list_package(&self, import_path: &str) -> Result<Package, ToolchainError> {
        self.state()?.lookups.push(import_path.to_owned());
        self.packages
            .get(import_path)
            .cloned()
            .ok_or_else(|| ToolchainError::PackageLookup {
                import_path: import_path.to_owned(),
                detail: format!("cannot find package \"{import_path}\""),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramfs_schema::Provenance;

    #[test]
    fn mock_lists_known_packages() {
        let tc = MockToolchain::new()
            .with_package(Package::new("fmt", Provenance::SystemRoot).with_go_files(["print.go"]));
        let p = tc.list_package("fmt").unwrap();
        assert_eq!(p.go_files, vec!["print.go"]);
        assert_eq!(tc.lookup_count("fmt"), 1);
    }

    #[test]
    fn mock_unknown_package_fails_lookup() {
        let tc = MockToolchain::new();
        let err = tc.list_package("nope").unwrap_err();
        assert!(matches!(err, ToolchainError::PackageLookup { .. }));
        assert_eq!(tc.lookups(), vec!["nope"]);
    }

    #[test]
    fn mock_lookup_is_repeatable() {
        let tc = MockToolchain::new().with_package(Package::new("os", Provenance::SystemRoot));
        let a = tc.list_package("os").unwrap();
        let b = tc.list_package("os").unwrap();
        assert_eq!(a, b);
        assert_eq!(tc.lookup_count("os"), 2);
    }

    #[test]
    fn mock_build_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("go/pkg/tool/linux_amd64/asm");
        let tc = MockToolchain::new();
        tc.build(&BuildRequest::new(&out).package("cmd/asm")).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "mock-binary:cmd/asm\n");
        assert_eq!(tc.builds().len(), 1);
    }

    #[test]
    fn mock_failing_build() {
        let dir = tempfile::tempdir().unwrap();
        let tc = MockToolchain::new().with_failing_build("cmd/link");
        let err = tc
            .build(&BuildRequest::new(dir.path().join("link")).package("cmd/link"))
            .unwrap_err();
        assert!(err.to_string().contains("cmd/link"));
        assert!(!dir.path().join("link").exists());
    }
}
