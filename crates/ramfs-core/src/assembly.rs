use crate::closure::{ClosureResolver, Manifests};
use crate::concurrency::shutdown_requested;
use crate::scratch::ScratchDir;
use crate::seeds::expand_patterns;
use crate::CoreError;
use ramfs_archive::{archive_name, seed_archive_transform, ArchiveSummary, Composer, INIT_NAME};
use ramfs_schema::{ArchiveDigest, AssemblyConfig, ImportPath};
use ramfs_toolchain::{BuildRequest, Toolchain};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Toolchain programs placed under `go/pkg/tool/<goos>_<goarch>/`.
pub const TOOLCHAIN_TOOLS: [&str; 3] = ["compile", "link", "asm"];

const OUTPUT_MODE: u32 = 0o644;

/// Outcome of a successful assembly run.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub digest: ArchiveDigest,
    pub records: usize,
    pub bytes: u64,
    pub seeds: usize,
    pub skipped_seeds: Vec<ImportPath>,
    pub packages: usize,
    pub system_files: usize,
    pub user_files: usize,
    /// Records copied from the seed archive, if one was given.
    pub ingested: usize,
}

/// Drives one end-to-end initramfs build.
///
/// A run expands the seed patterns, resolves their closure, builds the
/// toolchain (and, unless an existing init is kept, the init program) into
/// a scratch directory, and composes the archive in this order: seed archive
/// records, system include trees, system sources under `go/`, user sources,
/// then the scratch tree. The output appears atomically or not at all.
pub struct Assembler {
    config: AssemblyConfig,
    toolchain: Box<dyn Toolchain>,
}

impl Assembler {
    pub fn new(config: AssemblyConfig, toolchain: Box<dyn Toolchain>) -> Self {
        Self { config, toolchain }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    pub fn seeds(&self) -> Result<Vec<ImportPath>, CoreError> {
        expand_patterns(&self.config.gopath, &self.config.patterns)
    }

    pub fn resolve(&self, seeds: &[ImportPath]) -> Result<Manifests, CoreError> {
        ClosureResolver::new(self.toolchain.as_ref()).resolve(seeds)
    }

    /// Build `go/bin/go` and the compiler tools into `scratch`.
    pub fn build_toolchain(&self, scratch: &Path) -> Result<(), CoreError> {
        info!("building go toolchain for {}", self.config.platform());
        let go_src = self.config.goroot.join("src/cmd/go");
        self.toolchain.build(
            &BuildRequest::new(scratch.join("go/bin/go"))
                .in_dir(go_src)
                .arg("-tags")
                .arg("cmd_go_bootstrap"),
        )?;

        let tool_dir = scratch.join("go/pkg/tool").join(self.config.platform());
        for tool in TOOLCHAIN_TOOLS {
            checkpoint()?;
            debug!("building {tool}");
            self.toolchain
                .build(&BuildRequest::new(tool_dir.join(tool)).package(format!("cmd/{tool}")))?;
        }
        Ok(())
    }

    /// Build the init package to `scratch/init`.
    pub fn build_init(&self, scratch: &Path) -> Result<(), CoreError> {
        info!("building init from {}", self.config.init_package);
        self.toolchain.build(
            &BuildRequest::new(scratch.join(INIT_NAME)).package(&self.config.init_package),
        )?;
        Ok(())
    }

    /// Stream every archive section into `composer`. Returns the number of
    /// records ingested from the seed archive. Does not finalize.
    pub fn compose<W: Write>(
        &self,
        composer: &mut Composer<W>,
        manifests: &Manifests,
        scratch: &Path,
    ) -> Result<usize, CoreError> {
        let mut ingested = 0;
        if let Some(seed) = &self.config.initial_cpio {
            let file = File::open(seed).map_err(|source| CoreError::SeedArchive {
                path: seed.clone(),
                source,
            })?;
            let transform = seed_archive_transform(self.config.use_existing_init);
            ingested = composer.ingest_existing(BufReader::new(file), &transform)?;
            info!("ingested {ingested} records from {}", seed.display());
        }
        checkpoint()?;

        for tree in &self.config.system_trees {
            let dir = self.config.goroot.join(tree);
            if !dir.is_dir() {
                debug!("{} not present, skipping", dir.display());
                continue;
            }
            composer.append_tree(&dir, &archive_name("go", tree))?;
        }
        checkpoint()?;

        composer.append_files(&self.config.goroot, "go", &manifests.system)?;
        checkpoint()?;
        composer.append_files(&self.config.gopath, "", &manifests.user)?;
        checkpoint()?;

        composer.append_tree(scratch, "")?;
        Ok(ingested)
    }

    pub fn run(&self) -> Result<AssemblyReport, CoreError> {
        info!(
            "GOROOT {} GOPATH {} target {}",
            self.config.goroot.display(),
            self.config.gopath.display(),
            self.config.platform()
        );

        let seeds = self.seeds()?;
        if seeds.is_empty() {
            warn!("no seed packages; the archive will carry no package sources");
        }
        let manifests = self.resolve(&seeds)?;
        info!(
            "{} packages: {} system files, {} user files",
            manifests.packages.len(),
            manifests.system.len(),
            manifests.user.len()
        );
        checkpoint()?;

        let scratch = ScratchDir::acquire(self.config.tmpdir.as_deref())?;
        self.build_toolchain(scratch.path())?;
        if self.config.use_existing_init {
            info!("keeping init from the seed archive");
        } else {
            checkpoint()?;
            self.build_init(scratch.path())?;
        }
        checkpoint()?;

        let (summary, ingested) = self.write_archive(&manifests, scratch.path())?;
        scratch.release()?;

        let digest = digest_file(&self.config.output)?;
        info!(
            "wrote {} ({} records, {} bytes)",
            self.config.output.display(),
            summary.records,
            summary.bytes
        );

        Ok(AssemblyReport {
            output: self.config.output.clone(),
            digest,
            records: summary.records,
            bytes: summary.bytes,
            seeds: seeds.len(),
            skipped_seeds: manifests.skipped_seeds,
            packages: manifests.packages.len(),
            system_files: manifests.system.len(),
            user_files: manifests.user.len(),
            ingested,
        })
    }

    /// Compose into a temporary file beside the output and rename it into
    /// place once the trailer is written.
    fn write_archive(
        &self,
        manifests: &Manifests,
        scratch: &Path,
    ) -> Result<(ArchiveSummary, usize), CoreError> {
        let output = &self.config.output;
        let out_err = |source: std::io::Error| CoreError::Output {
            path: output.clone(),
            source,
        };

        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(out_err)?;
        let tmp = NamedTempFile::new_in(&dir).map_err(out_err)?;

        let mut composer = Composer::new(BufWriter::new(tmp));
        let ingested = self.compose(&mut composer, manifests, scratch)?;
        let summary = composer.finalize()?;

        let tmp = composer
            .into_inner()
            .into_inner()
            .map_err(|e| out_err(e.into_error()))?;
        tmp.as_file().sync_all().map_err(out_err)?;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(OUTPUT_MODE))
            .map_err(out_err)?;
        tmp.persist(output).map_err(|e| out_err(e.error))?;
        Ok((summary, ingested))
    }
}

fn checkpoint() -> Result<(), CoreError> {
    if shutdown_requested() {
        warn!("interrupted, abandoning assembly");
        return Err(CoreError::Interrupted);
    }
    Ok(())
}

pub fn digest_file(path: &Path) -> Result<ArchiveDigest, CoreError> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(ArchiveDigest::new(hasher.finalize().to_hex().to_string()))
}
