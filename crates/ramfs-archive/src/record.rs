use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

pub const S_IFMT: u32 = 0o170_000;
pub const S_IFSOCK: u32 = 0o140_000;
pub const S_IFLNK: u32 = 0o120_000;
pub const S_IFREG: u32 = 0o100_000;
pub const S_IFBLK: u32 = 0o060_000;
pub const S_IFDIR: u32 = 0o040_000;
pub const S_IFCHR: u32 = 0o020_000;
pub const S_IFIFO: u32 = 0o010_000;

/// Header fields of one archive record.
///
/// Every field except `size` is 32 bits wide in the `newc` header; `size`
/// is range-checked when the record is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub size: u64,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub rdev_major: u32,
    pub rdev_minor: u32,
}

impl Metadata {
    pub fn file_type(&self) -> u32 {
        self.mode & S_IFMT
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.file_type() == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type() == S_IFLNK
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Where a record's body comes from.
///
/// `File` is read lazily when the record is written, exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Content {
    #[default]
    Empty,
    Inline(Vec<u8>),
    File(PathBuf),
}

/// A record name as it appears in the archive: raw bytes, without the
/// trailing NUL. Not required to be UTF-8.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordName(Vec<u8>);

impl RecordName {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The name as text, if it is valid UTF-8.
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<Vec<u8>> for RecordName {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RecordName {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<String> for RecordName {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<&str> for RecordName {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<&RecordName> for RecordName {
    fn from(name: &RecordName) -> Self {
        name.clone()
    }
}

impl AsRef<[u8]> for RecordName {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq<str> for RecordName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for RecordName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<[u8]> for RecordName {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl fmt::Display for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

/// One named archive entry: header metadata plus a content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: RecordName,
    pub meta: Metadata,
    pub content: Content,
}

impl Record {
    /// A regular file with in-memory content and mode `0o644`.
    pub fn file(name: impl Into<RecordName>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            meta: Metadata {
                mode: S_IFREG | 0o644,
                nlink: 1,
                size: data.len() as u64,
                ..Metadata::default()
            },
            content: Content::Inline(data),
        }
    }

    /// A directory with mode `0o755`.
    pub fn directory(name: impl Into<RecordName>) -> Self {
        Self {
            name: name.into(),
            meta: Metadata {
                mode: S_IFDIR | 0o755,
                nlink: 2,
                ..Metadata::default()
            },
            content: Content::Empty,
        }
    }

    /// A symlink pointing at `target`.
    pub fn symlink(name: impl Into<RecordName>, target: impl Into<Vec<u8>>) -> Self {
        let target = target.into();
        Self {
            name: name.into(),
            meta: Metadata {
                mode: S_IFLNK | 0o777,
                nlink: 1,
                size: target.len() as u64,
                ..Metadata::default()
            },
            content: Content::Inline(target),
        }
    }

    /// Build a record describing the filesystem object at `path`, without
    /// following symlinks. Regular file content is left on disk until write.
    pub fn from_path(name: impl Into<RecordName>, path: &Path) -> std::io::Result<Self> {
        let fs_meta = fs::symlink_metadata(path)?;
        let ft = fs_meta.file_type();

        let (content, size) = if ft.is_file() {
            (Content::File(path.to_path_buf()), fs_meta.len())
        } else if ft.is_symlink() {
            let target = fs::read_link(path)?.as_os_str().as_bytes().to_vec();
            let len = target.len() as u64;
            (Content::Inline(target), len)
        } else {
            (Content::Empty, 0)
        };

        let (dev, rdev) = (fs_meta.dev(), fs_meta.rdev());
        Ok(Self {
            name: name.into(),
            meta: Metadata {
                // newc carries 32-bit inode numbers; keep the low bits.
                ino: fs_meta.ino() as u32,
                mode: fs_meta.mode(),
                uid: fs_meta.uid(),
                gid: fs_meta.gid(),
                nlink: fs_meta.nlink() as u32,
                mtime: u32::try_from(fs_meta.mtime().max(0)).unwrap_or(u32::MAX),
                size,
                dev_major: libc::major(dev),
                dev_minor: libc::minor(dev),
                rdev_major: libc::major(rdev),
                rdev_minor: libc::minor(rdev),
            },
            content,
        })
    }
}

/// Join an archive name prefix and a relative path with `/`, byte for byte.
///
/// An empty prefix yields the bare relative path.
pub fn archive_name(prefix: impl AsRef<[u8]>, relative: &Path) -> RecordName {
    let mut prefix = prefix.as_ref();
    while let [rest @ .., b'/'] = prefix {
        prefix = rest;
    }

    let mut name = prefix.to_vec();
    for component in relative.components() {
        if !name.is_empty() {
            name.push(b'/');
        }
        name.extend_from_slice(component.as_os_str().as_bytes());
    }
    RecordName(name)
}
