use crate::newc::{NewcReader, NewcWriter};
use crate::record::{archive_name, Record};
use crate::transform::{RecordTransform, Reproducible};
use crate::ArchiveError;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposerState {
    Empty,
    Appending,
    Finalized,
    /// A record broke off mid-write; the stream cannot be finished.
    Failed,
}

impl fmt::Display for ComposerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposerState::Empty => f.write_str("empty"),
            ComposerState::Appending => f.write_str("appending"),
            ComposerState::Finalized => f.write_str("finalized"),
            ComposerState::Failed => f.write_str("failed"),
        }
    }
}

/// Totals reported when an archive is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    /// Records written, excluding the trailer.
    pub records: usize,
    /// Total stream length including trailer and block padding.
    pub bytes: u64,
}

/// Builds one output archive stream.
///
/// `Empty -> Appending -> Finalized`. Every write operation fails with
/// [`ArchiveError::ArchiveClosed`] once [`Composer::finalize`] has run. A
/// record that fails after its header was written moves the composer to
/// `Failed`, after which writes and `finalize` return
/// [`ArchiveError::ArchiveFailed`].
/// Records are written in exactly the order they are supplied.
pub struct Composer<W: Write> {
    writer: NewcWriter<W>,
    state: ComposerState,
    records: usize,
    /// Applied to records built from the filesystem (`append_files`, `append_tree`).
    file_transform: Box<dyn RecordTransform>,
}

impl<W: Write> Composer<W> {
    /// New composer whose filesystem records pass through [`Reproducible`].
    pub fn new(out: W) -> Self {
        Self::with_transform(out, Reproducible)
    }

    pub fn with_transform(out: W, transform: impl RecordTransform + 'static) -> Self {
        Self {
            writer: NewcWriter::new(out),
            state: ComposerState::Empty,
            records: 0,
            file_transform: Box::new(transform),
        }
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    /// Records written so far, excluding the trailer.
    pub fn records_written(&self) -> usize {
        self.records
    }

    fn ensure_open(&self) -> Result<(), ArchiveError> {
        match self.state {
            ComposerState::Finalized => Err(ArchiveError::ArchiveClosed),
            ComposerState::Failed => Err(ArchiveError::ArchiveFailed(
                self.writer.failed_record().unwrap_or_default().to_owned(),
            )),
            ComposerState::Empty | ComposerState::Appending => Ok(()),
        }
    }

    /// Write a single record as-is.
    pub fn write_record(&mut self, record: &Record) -> Result<(), ArchiveError> {
        self.ensure_open()?;
        if let Err(e) = self.writer.write_record(record) {
            if self.writer.failed_record().is_some() {
                self.state = ComposerState::Failed;
            }
            return Err(e);
        }
        self.records += 1;
        self.state = ComposerState::Appending;
        Ok(())
    }

    /// Copy every record of `source` (up to its trailer) into the output,
    /// passing each through `transform` in stream order. Returns the number
    /// of records copied.
    pub fn ingest_existing<R: Read>(
        &mut self,
        source: R,
        transform: &dyn RecordTransform,
    ) -> Result<usize, ArchiveError> {
        self.ensure_open()?;
        let mut reader = NewcReader::new(source);
        let mut count = 0;
        while let Some(record) = reader.next_record()? {
            let record = transform.apply(record);
            self.write_record(&record)?;
            count += 1;
        }
        debug!("ingested {count} records from seed archive");
        Ok(count)
    }

    /// Write `root/<path>` as `prefix/<path>` for each relative path, in order.
    /// Aborts on the first path that cannot be read.
    pub fn append_files<P: AsRef<Path>>(
        &mut self,
        root: &Path,
        prefix: impl AsRef<[u8]>,
        relative_paths: &[P],
    ) -> Result<usize, ArchiveError> {
        self.ensure_open()?;
        let prefix = prefix.as_ref();
        for rel in relative_paths {
            let rel = rel.as_ref();
            let full = root.join(rel);
            let record = Record::from_path(archive_name(prefix, rel), &full).map_err(|source| {
                ArchiveError::SourceFileUnreadable {
                    path: full.clone(),
                    source,
                }
            })?;
            let record = self.file_transform.apply(record);
            self.write_record(&record)?;
        }
        debug!(
            "appended {} files from {} under '{}'",
            relative_paths.len(),
            root.display(),
            prefix.escape_ascii()
        );
        Ok(relative_paths.len())
    }

    /// Recursively write every entry under `root` as `prefix/<relative path>`.
    ///
    /// Traversal is depth-first with siblings sorted by name. The root itself
    /// is written under `prefix` when the prefix is non-empty and skipped
    /// otherwise. Symlinks are recorded, not followed.
    pub fn append_tree(
        &mut self,
        root: &Path,
        prefix: impl AsRef<[u8]>,
    ) -> Result<usize, ArchiveError> {
        self.ensure_open()?;
        let prefix = prefix.as_ref();
        let bare_root = prefix.iter().all(|&b| b == b'/');
        let mut count = 0;
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| ArchiveError::SourceFileUnreadable {
                path: e.path().unwrap_or(root).to_path_buf(),
                source: e.into(),
            })?;
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if rel.as_os_str().is_empty() && bare_root {
                continue;
            }
            let record =
                Record::from_path(archive_name(prefix, rel), entry.path()).map_err(|source| {
                    ArchiveError::SourceFileUnreadable {
                        path: entry.path().to_path_buf(),
                        source,
                    }
                })?;
            let record = self.file_transform.apply(record);
            self.write_record(&record)?;
            count += 1;
        }
        debug!(
            "appended tree {} ({count} entries) under '{}'",
            root.display(),
            prefix.escape_ascii()
        );
        Ok(count)
    }

    /// Write the trailer, pad to the block boundary, and close the archive.
    /// A second call fails and writes nothing.
    pub fn finalize(&mut self) -> Result<ArchiveSummary, ArchiveError> {
        self.ensure_open()?;
        if let Err(e) = self.writer.write_trailer() {
            if self.writer.failed_record().is_some() {
                self.state = ComposerState::Failed;
            }
            return Err(e);
        }
        self.state = ComposerState::Finalized;
        Ok(ArchiveSummary {
            records: self.records,
            bytes: self.writer.offset(),
        })
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newc::BLOCK_SIZE;
    use crate::record::Content;
    use crate::transform::Identity;
    use std::fs;

    fn decode(bytes: &[u8]) -> Vec<Record> {
        NewcReader::new(bytes).collect::<Result<_, _>>().unwrap()
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.name.to_str().unwrap()).collect()
    }

    #[test]
    fn new_composer_is_empty() {
        let c = Composer::new(Vec::new());
        assert_eq!(c.state(), ComposerState::Empty);
        assert_eq!(c.records_written(), 0);
    }

    #[test]
    fn write_moves_to_appending() {
        let mut c = Composer::new(Vec::new());
        c.write_record(&Record::file("a", "x")).unwrap();
        assert_eq!(c.state(), ComposerState::Appending);
    }

    #[test]
    fn finalize_on_empty_writes_trailer_only() {
        let mut c = Composer::new(Vec::new());
        let summary = c.finalize().unwrap();
        assert_eq!(summary.records, 0);
        assert_eq!(summary.bytes, BLOCK_SIZE);
        assert!(decode(&c.into_inner()).is_empty());
    }

    #[test]
    fn operations_after_finalize_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = Composer::new(Vec::new());
        c.finalize().unwrap();
        let len = c.get_ref().len();

        assert!(matches!(
            c.write_record(&Record::file("a", "x")),
            Err(ArchiveError::ArchiveClosed)
        ));
        assert!(matches!(
            c.append_files(dir.path(), "", &[] as &[&str]),
            Err(ArchiveError::ArchiveClosed)
        ));
        assert!(matches!(
            c.append_tree(dir.path(), ""),
            Err(ArchiveError::ArchiveClosed)
        ));
        assert!(matches!(
            c.ingest_existing(&b""[..], &Identity),
            Err(ArchiveError::ArchiveClosed)
        ));
        assert!(matches!(c.finalize(), Err(ArchiveError::ArchiveClosed)));
        assert_eq!(c.get_ref().len(), len, "nothing written after finalize");
    }

    #[test]
    fn append_files_preserves_order_and_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cmds/init")).unwrap();
        fs::create_dir_all(dir.path().join("cmds/ls")).unwrap();
        fs::write(dir.path().join("cmds/init/main.go"), "package main\n").unwrap();
        fs::write(dir.path().join("cmds/ls/ls.go"), "package ls\n").unwrap();

        let mut c = Composer::new(Vec::new());
        let n = c
            .append_files(dir.path(), "", &["cmds/ls/ls.go", "cmds/init/main.go"])
            .unwrap();
        assert_eq!(n, 2);
        c.finalize().unwrap();

        let records = decode(&c.into_inner());
        assert_eq!(names(&records), vec!["cmds/ls/ls.go", "cmds/init/main.go"]);
        assert_eq!(records[0].content, Content::Inline(b"package ls\n".to_vec()));
        assert_eq!(records[0].meta.mtime, 0);
        assert_eq!(records[0].meta.uid, 0);
    }

    #[test]
    fn append_files_applies_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "a").unwrap();
        let mut c = Composer::new(Vec::new());
        c.append_files(dir.path(), "go", &["a.go"]).unwrap();
        c.finalize().unwrap();
        assert_eq!(names(&decode(&c.into_inner())), vec!["go/a.go"]);
    }

    #[test]
    fn append_files_fails_on_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.go"), "ok").unwrap();
        let mut c = Composer::new(Vec::new());
        let err = c
            .append_files(dir.path(), "", &["ok.go", "missing.go", "never.go"])
            .unwrap_err();
        match err {
            ArchiveError::SourceFileUnreadable { path, .. } => {
                assert_eq!(path, dir.path().join("missing.go"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(c.records_written(), 1);
    }

    #[test]
    fn append_tree_walks_sorted_and_skips_root_without_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("go/bin")).unwrap();
        fs::write(dir.path().join("go/bin/go"), "go").unwrap();
        fs::write(dir.path().join("init"), "init").unwrap();
        std::os::unix::fs::symlink("init", dir.path().join("bbin")).unwrap();

        let mut c = Composer::new(Vec::new());
        let n = c.append_tree(dir.path(), "").unwrap();
        assert_eq!(n, 5);
        c.finalize().unwrap();

        let records = decode(&c.into_inner());
        assert_eq!(names(&records), vec!["bbin", "go", "go/bin", "go/bin/go", "init"]);
        assert!(records[0].meta.is_symlink());
        assert!(records[1].meta.is_dir());
        assert_eq!(records[4].content, Content::Inline(b"init".to_vec()));
    }

    #[test]
    fn append_tree_with_prefix_includes_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stdio.h"), "").unwrap();
        let mut c = Composer::new(Vec::new());
        c.append_tree(dir.path(), "go/pkg/include").unwrap();
        c.finalize().unwrap();
        assert_eq!(
            names(&decode(&c.into_inner())),
            vec!["go/pkg/include", "go/pkg/include/stdio.h"]
        );
    }

    #[test]
    fn record_broken_mid_write_fails_the_composer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool");
        fs::write(&path, "abc").unwrap();
        let mut short = Record::from_path("go/bin/tool", &path).unwrap();
        short.meta.size = 5;

        let mut c = Composer::new(Vec::new());
        c.write_record(&Record::file("a", "x")).unwrap();
        assert!(matches!(
            c.write_record(&short),
            Err(ArchiveError::SizeMismatch { .. })
        ));
        assert_eq!(c.state(), ComposerState::Failed);
        assert_eq!(c.records_written(), 1);

        assert!(matches!(
            c.write_record(&Record::file("b", "y")),
            Err(ArchiveError::ArchiveFailed(name)) if name == "go/bin/tool"
        ));
        assert!(matches!(
            c.append_tree(dir.path(), ""),
            Err(ArchiveError::ArchiveFailed(_))
        ));
        assert!(matches!(c.finalize(), Err(ArchiveError::ArchiveFailed(_))));
        assert_eq!(c.state(), ComposerState::Failed);
    }

    #[test]
    fn unopenable_file_leaves_the_composer_usable() {
        let mut missing = Record::file("bin/tool", "");
        missing.meta.size = 5;
        missing.content = Content::File("/nonexistent/tool".into());

        let mut c = Composer::new(Vec::new());
        assert!(matches!(
            c.write_record(&missing),
            Err(ArchiveError::SourceFileUnreadable { .. })
        ));
        assert_eq!(c.state(), ComposerState::Empty);
        c.write_record(&Record::file("a", "x")).unwrap();
        c.finalize().unwrap();
        assert_eq!(names(&decode(&c.into_inner())), vec!["a"]);
    }

    #[test]
    fn append_tree_keeps_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let raw = b"caf\xe9";
        if fs::write(dir.path().join(OsStr::from_bytes(raw)), "x").is_err() {
            // filesystem refuses non-UTF-8 names
            return;
        }
        let mut c = Composer::new(Vec::new());
        c.append_tree(dir.path(), "etc").unwrap();
        c.finalize().unwrap();

        let records = decode(&c.into_inner());
        assert_eq!(records[1].name.as_bytes(), b"etc/caf\xe9");
    }

    #[test]
    fn append_tree_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = Composer::new(Vec::new());
        let err = c.append_tree(&dir.path().join("nope"), "").unwrap_err();
        assert!(matches!(err, ArchiveError::SourceFileUnreadable { .. }));
    }

    #[test]
    fn ingest_preserves_count_and_order() {
        let mut seed = Composer::with_transform(Vec::new(), Identity);
        for name in ["etc", "etc/passwd", "init", "bin"] {
            seed.write_record(&Record::file(name, name)).unwrap();
        }
        seed.finalize().unwrap();
        let seed = seed.into_inner();

        let mut c = Composer::new(Vec::new());
        let n = c.ingest_existing(seed.as_slice(), &Reproducible).unwrap();
        assert_eq!(n, 4);
        c.finalize().unwrap();
        assert_eq!(
            names(&decode(&c.into_inner())),
            vec!["etc", "etc/passwd", "init", "bin"]
        );
    }

    #[test]
    fn ingest_malformed_source_fails() {
        let mut c = Composer::new(Vec::new());
        let err = c
            .ingest_existing(&b"not a cpio archive"[..], &Identity)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedSourceArchive(_)));
    }

    #[test]
    fn output_is_reproducible_across_builds() {
        let build = || {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("sub")).unwrap();
            fs::write(dir.path().join("sub/f"), "same").unwrap();
            let mut c = Composer::new(Vec::new());
            c.append_tree(dir.path(), "").unwrap();
            c.finalize().unwrap();
            c.into_inner()
        };
        assert_eq!(build(), build());
    }
}
