//! End-to-end assembly runs against the mock toolchain.

use ramfs_archive::{Composer, Content, NewcReader, Record, BLOCK_SIZE};
use ramfs_core::{Assembler, CoreError};
use ramfs_schema::{AssemblyConfig, Package, Provenance};
use ramfs_toolchain::{MockToolchain, ToolchainError};
use std::fs;
use std::path::{Path, PathBuf};

struct Fixture {
    root: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let files = [
            ("goroot/src/fmt/print.go", "package fmt\n"),
            ("goroot/src/os/file.go", "package os\n"),
            ("goroot/pkg/include/textflag.h", "#define NOSPLIT 4\n"),
            ("gopath/src/example.com/cmds/ls/ls.go", "package main\n"),
            ("gopath/src/example.com/cmds/init/init.go", "package main\n"),
            ("gopath/src/example.com/pkg/util/util.go", "package util\n"),
        ];
        for (path, content) in files {
            let p = root.path().join(path);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, content).unwrap();
        }
        fs::create_dir_all(root.path().join("scratch")).unwrap();
        Self { root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn config(&self) -> AssemblyConfig {
        AssemblyConfig {
            goroot: self.path("goroot"),
            gopath: self.path("gopath"),
            goarch: "amd64".to_owned(),
            goos: "linux".to_owned(),
            toolchain: "mock".to_owned(),
            patterns: vec!["src/example.com/cmds/*".to_owned()],
            init_package: "example.com/cmds/init".to_owned(),
            system_trees: vec![PathBuf::from("pkg/include")],
            initial_cpio: None,
            use_existing_init: false,
            output: self.path("out/initramfs.cpio"),
            tmpdir: Some(self.path("scratch")),
        }
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.path("scratch")).unwrap().next().is_none()
    }
}

fn toolchain() -> MockToolchain {
    MockToolchain::new()
        .with_package(
            Package::new("example.com/cmds/ls", Provenance::UserTree)
                .with_go_files(["ls.go"])
                .with_deps(["example.com/pkg/util", "fmt"]),
        )
        .with_package(
            Package::new("example.com/cmds/init", Provenance::UserTree)
                .with_go_files(["init.go"])
                .with_deps(["fmt"]),
        )
        .with_package(
            Package::new("example.com/pkg/util", Provenance::UserTree)
                .with_go_files(["util.go"])
                .with_deps(["os"]),
        )
        .with_package(
            Package::new("fmt", Provenance::SystemRoot)
                .with_go_files(["print.go"])
                .with_deps(["os"]),
        )
        .with_package(Package::new("os", Provenance::SystemRoot).with_go_files(["file.go"]))
}

fn read_archive(path: &Path) -> Vec<Record> {
    let bytes = fs::read(path).unwrap();
    assert_eq!(bytes.len() as u64 % BLOCK_SIZE, 0);
    NewcReader::new(bytes.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn names(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.name.to_str().unwrap()).collect()
}

fn write_seed(path: &Path, records: &[Record]) {
    let mut c = Composer::new(Vec::new());
    for r in records {
        c.write_record(r).unwrap();
    }
    c.finalize().unwrap();
    fs::write(path, c.into_inner()).unwrap();
}

#[test]
fn full_run_writes_closure_toolchain_and_init() {
    let f = Fixture::new();
    let config = f.config();
    let report = Assembler::new(config.clone(), Box::new(toolchain()))
        .run()
        .unwrap();

    let records = read_archive(&config.output);
    let names = names(&records);
    for expected in [
        "go/pkg/include",
        "go/pkg/include/textflag.h",
        "go/src/fmt/print.go",
        "go/src/os/file.go",
        "src/example.com/cmds/init/init.go",
        "src/example.com/cmds/ls/ls.go",
        "src/example.com/pkg/util/util.go",
        "go/bin/go",
        "go/pkg/tool/linux_amd64/compile",
        "go/pkg/tool/linux_amd64/link",
        "go/pkg/tool/linux_amd64/asm",
        "init",
    ] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }

    let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
    assert!(pos("go/pkg/include/textflag.h") < pos("go/src/fmt/print.go"));
    assert!(pos("go/src/os/file.go") < pos("src/example.com/cmds/ls/ls.go"));
    assert!(pos("src/example.com/pkg/util/util.go") < pos("init"));

    assert!(records.iter().all(|r| r.meta.uid == 0 && r.meta.mtime == 0));
    assert_eq!(report.records, records.len());
    assert_eq!(report.system_files, 2);
    assert_eq!(report.user_files, 3);
    assert_eq!(report.seeds, 2);
    assert_eq!(
        report.digest.as_str(),
        blake3::hash(&fs::read(&config.output).unwrap())
            .to_hex()
            .as_str()
    );
    assert!(f.scratch_is_empty());
}

#[test]
fn seed_init_is_kept_as_inito() {
    let f = Fixture::new();
    let seed = f.path("seed.cpio");
    write_seed(
        &seed,
        &[Record::file("init", "old init"), Record::directory("etc")],
    );
    let mut config = f.config();
    config.initial_cpio = Some(seed);

    let report = Assembler::new(config.clone(), Box::new(toolchain()))
        .run()
        .unwrap();
    assert_eq!(report.ingested, 2);

    let records = read_archive(&config.output);
    let inito: Vec<_> = records.iter().filter(|r| r.name == "inito").collect();
    let init: Vec<_> = records.iter().filter(|r| r.name == "init").collect();
    assert_eq!(inito.len(), 1);
    assert_eq!(inito[0].content, Content::Inline(b"old init".to_vec()));
    assert_eq!(init.len(), 1);
    assert_eq!(
        init[0].content,
        Content::Inline(b"mock-binary:example.com/cmds/init\n".to_vec())
    );
    assert_eq!(records[0].name, "inito");
}

#[test]
fn existing_init_is_used_as_is() {
    let f = Fixture::new();
    let seed = f.path("seed.cpio");
    write_seed(&seed, &[Record::file("init", "custom init")]);
    let mut config = f.config();
    config.initial_cpio = Some(seed);
    config.use_existing_init = true;

    Assembler::new(config.clone(), Box::new(toolchain()))
        .run()
        .unwrap();

    let records = read_archive(&config.output);
    let init: Vec<_> = records.iter().filter(|r| r.name == "init").collect();
    assert_eq!(init.len(), 1);
    assert_eq!(init[0].content, Content::Inline(b"custom init".to_vec()));
    assert!(!names(&records).contains(&"inito"));
}

#[test]
fn no_seeds_still_produces_a_valid_archive() {
    let f = Fixture::new();
    let mut config = f.config();
    config.patterns = vec!["src/nothing/*".to_owned()];

    let report = Assembler::new(config.clone(), Box::new(toolchain()))
        .run()
        .unwrap();
    assert_eq!(report.seeds, 0);
    assert_eq!(report.system_files + report.user_files, 0);

    let records = read_archive(&config.output);
    assert!(names(&records)
        .iter()
        .all(|n| !n.starts_with("src/") && !n.starts_with("go/src/")));
    assert!(names(&records).contains(&"init"));
}

#[test]
fn unresolvable_seed_is_skipped() {
    let f = Fixture::new();
    fs::create_dir_all(f.path("gopath/src/example.com/cmds/broken")).unwrap();
    let config = f.config();

    let report = Assembler::new(config, Box::new(toolchain())).run().unwrap();
    assert_eq!(report.skipped_seeds, vec!["example.com/cmds/broken"]);
    assert_eq!(report.seeds, 3);
}

#[test]
fn failed_build_leaves_no_output_and_no_scratch() {
    let f = Fixture::new();
    let config = f.config();
    let tc = toolchain().with_failing_build("cmd/link");

    let err = Assembler::new(config.clone(), Box::new(tc))
        .run()
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Toolchain(ToolchainError::BuildFailed { .. })
    ));
    assert!(!config.output.exists());
    assert!(f.scratch_is_empty());
}

#[test]
fn missing_dependency_aborts_before_building() {
    let f = Fixture::new();
    let config = f.config();
    let tc = toolchain().with_package(
        Package::new("example.com/cmds/ls", Provenance::UserTree)
            .with_go_files(["ls.go"])
            .with_deps(["example.com/gone"]),
    );

    let err = Assembler::new(config.clone(), Box::new(tc))
        .run()
        .unwrap_err();
    match err {
        CoreError::FatalClosure { import_path, .. } => assert_eq!(import_path, "example.com/gone"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!config.output.exists());
    assert!(f.scratch_is_empty());
}

#[test]
fn unreadable_source_file_aborts_without_output() {
    let f = Fixture::new();
    let config = f.config();
    let tc = toolchain().with_package(
        Package::new("os", Provenance::SystemRoot).with_go_files(["file.go", "missing.go"]),
    );

    let err = Assembler::new(config.clone(), Box::new(tc))
        .run()
        .unwrap_err();
    assert!(matches!(err, CoreError::Archive(_)));
    assert!(!config.output.exists());
    assert_eq!(fs::read_dir(f.path("out")).unwrap().count(), 0);
    assert!(f.scratch_is_empty());
}

#[test]
fn missing_seed_archive_is_reported() {
    let f = Fixture::new();
    let mut config = f.config();
    config.initial_cpio = Some(f.path("nope.cpio"));

    let err = Assembler::new(config.clone(), Box::new(toolchain()))
        .run()
        .unwrap_err();
    assert!(matches!(err, CoreError::SeedArchive { .. }));
    assert!(!config.output.exists());
    assert!(f.scratch_is_empty());
}

#[test]
fn repeated_runs_are_byte_identical() {
    let f = Fixture::new();
    let seed = f.path("seed.cpio");
    let mut stamped = Record::file("etc/motd", "hello\n");
    stamped.meta.mtime = 1_700_000_000;
    stamped.meta.uid = 1000;
    write_seed(&seed, &[stamped, Record::file("init", "x")]);

    let mut first = f.config();
    first.initial_cpio = Some(seed);
    let mut second = first.clone();
    second.output = f.path("out/second.cpio");

    let a = Assembler::new(first, Box::new(toolchain())).run().unwrap();
    // Touch a source file so its host mtime changes between runs.
    fs::write(f.path("goroot/src/fmt/print.go"), "package fmt\n").unwrap();
    let b = Assembler::new(second, Box::new(toolchain())).run().unwrap();

    assert_eq!(a.digest, b.digest);
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn report_serializes_to_json() {
    let f = Fixture::new();
    let report = Assembler::new(f.config(), Box::new(toolchain()))
        .run()
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["records"], report.records);
    assert!(json["digest"].is_string());
}
