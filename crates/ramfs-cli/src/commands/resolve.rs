use super::{json_pretty, make_toolchain, EXIT_SUCCESS};
use console::Style;
use ramfs_core::Assembler;
use ramfs_schema::AssemblyConfig;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ClosureReport<'a> {
    goroot: &'a PathBuf,
    gopath: &'a PathBuf,
    #[serde(flatten)]
    manifests: &'a ramfs_core::Manifests,
}

pub fn run(config: AssemblyConfig, json: bool) -> Result<u8, String> {
    let toolchain = make_toolchain(&config)?;
    let assembler = Assembler::new(config, toolchain);
    let seeds = assembler.seeds().map_err(|e| e.to_string())?;
    let manifests = assembler.resolve(&seeds).map_err(|e| e.to_string())?;
    let config = assembler.config();

    if json {
        let report = ClosureReport {
            goroot: &config.goroot,
            gopath: &config.gopath,
            manifests: &manifests,
        };
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    let header = Style::new().bold();
    println!(
        "{} {}",
        header.apply_to("system-root files, relative to"),
        config.goroot.display()
    );
    for path in &manifests.system {
        println!("  {}", path.display());
    }
    println!(
        "{} {}",
        header.apply_to("user-tree files, relative to"),
        config.gopath.display()
    );
    for path in &manifests.user {
        println!("  {}", path.display());
    }
    if !manifests.skipped_seeds.is_empty() {
        let warn = Style::new().yellow();
        for seed in &manifests.skipped_seeds {
            println!("{} {seed}", warn.apply_to("skipped:"));
        }
    }
    println!(
        "{} packages, {} files",
        manifests.packages.len(),
        manifests.file_count()
    );
    Ok(EXIT_SUCCESS)
}
