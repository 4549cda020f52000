//! cpio (`newc`) archive records, codec, transforms, and stream composition for ramfs.
//!
//! This crate provides the archive layer: the `Record` model, a streaming
//! `newc` encoder/decoder (`NewcWriter`, `NewcReader`), composable record
//! transforms (`Reproducible`, `RenameRecord`, `TransformChain`), and the
//! `Composer` that assembles an ordered archive from a seed archive, file
//! lists, and directory trees before sealing it with a trailer.

pub mod composer;
pub mod newc;
pub mod record;
pub mod transform;

pub use composer::{ArchiveSummary, Composer, ComposerState};
pub use newc::{NewcReader, NewcWriter, BLOCK_SIZE, TRAILER_NAME};
pub use record::{archive_name, Content, Metadata, Record, RecordName};
pub use transform::{
    seed_archive_transform, Identity, RecordTransform, RenameRecord, Reproducible,
    TransformChain, INIT_NAME, RENAMED_INIT_NAME,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read source file {}: {source}", path.display())]
    SourceFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed source archive: {0}")]
    MalformedSourceArchive(String),
    #[error("archive is closed: the trailer has already been written")]
    ArchiveClosed,
    #[error("archive is unusable: record '{0}' failed after its header was written")]
    ArchiveFailed(String),
    #[error("record '{name}': {field} does not fit in a newc header field")]
    FieldOverflow { name: String, field: &'static str },
    #[error("record '{name}': declared size {expected}, got {actual} bytes")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_error_display_unreadable() {
        let e = ArchiveError::SourceFileUnreadable {
            path: PathBuf::from("/go/src/fmt/print.go"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(e.to_string().contains("/go/src/fmt/print.go"));
    }

    #[test]
    fn archive_error_display_closed() {
        assert!(ArchiveError::ArchiveClosed.to_string().contains("closed"));
    }

    #[test]
    fn archive_error_display_failed() {
        let e = ArchiveError::ArchiveFailed("go/bin/go".to_owned());
        assert!(e.to_string().contains("go/bin/go"));
    }

    #[test]
    fn archive_error_display_malformed() {
        let e = ArchiveError::MalformedSourceArchive("bad magic".to_owned());
        assert!(e.to_string().contains("bad magic"));
    }

    #[test]
    fn archive_error_display_overflow() {
        let e = ArchiveError::FieldOverflow {
            name: "big".to_owned(),
            field: "filesize",
        };
        let msg = e.to_string();
        assert!(msg.contains("big"));
        assert!(msg.contains("filesize"));
    }
}
