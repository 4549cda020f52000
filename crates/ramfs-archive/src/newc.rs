//! SVR4 "new ASCII" (`newc`) cpio encoding, the format the Linux kernel
//! unpacks as an initramfs.
//!
//! Layout per record:
//!
//! ```text
//! magic "070701" | 13 x 8 hex digits | name + NUL | pad to 4 | data | pad to 4
//! ```
//!
//! The stream ends with a record named [`TRAILER_NAME`] and is padded with
//! NUL bytes to a multiple of [`BLOCK_SIZE`].

use crate::record::{Content, Metadata, Record, RecordName};
use crate::ArchiveError;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 6] = b"070701";
pub const MAGIC_CRC: &[u8; 6] = b"070702";
pub const HEADER_LEN: usize = 110;
pub const TRAILER_NAME: &str = "TRAILER!!!";
pub const BLOCK_SIZE: u64 = 512;

const FIELD_COUNT: usize = 13;

fn pad4(offset: u64) -> usize {
    ((4 - (offset % 4)) % 4) as usize
}

fn field_overflow(name: &RecordName, field: &'static str) -> ArchiveError {
    ArchiveError::FieldOverflow {
        name: name.to_string(),
        field,
    }
}

/// Encode the fixed-width header for `meta` and a name of `namesize` bytes
/// (including the terminating NUL).
pub fn encode_header(name: &RecordName, meta: &Metadata) -> Result<[u8; HEADER_LEN], ArchiveError> {
    let size = u32::try_from(meta.size).map_err(|_| field_overflow(name, "filesize"))?;
    let namesize =
        u32::try_from(name.len() + 1).map_err(|_| field_overflow(name, "namesize"))?;

    let fields: [u32; FIELD_COUNT] = [
        meta.ino,
        meta.mode,
        meta.uid,
        meta.gid,
        meta.nlink,
        meta.mtime,
        size,
        meta.dev_major,
        meta.dev_minor,
        meta.rdev_major,
        meta.rdev_minor,
        namesize,
        0,
    ];

    let mut header = [0u8; HEADER_LEN];
    header[..6].copy_from_slice(MAGIC);
    for (i, value) in fields.iter().enumerate() {
        let start = 6 + i * 8;
        header[start..start + 8].copy_from_slice(format!("{value:08X}").as_bytes());
    }
    Ok(header)
}

fn parse_field(raw: &[u8], index: usize) -> Result<u32, ArchiveError> {
    let text = std::str::from_utf8(raw).map_err(|_| {
        ArchiveError::MalformedSourceArchive(format!("header field {index} is not ASCII"))
    })?;
    u32::from_str_radix(text, 16).map_err(|_| {
        ArchiveError::MalformedSourceArchive(format!("header field {index} is not hex: {text:?}"))
    })
}

/// Decode a header into its metadata and the declared name size.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(Metadata, usize), ArchiveError> {
    let magic = &header[..6];
    if magic != MAGIC && magic != MAGIC_CRC {
        return Err(ArchiveError::MalformedSourceArchive(format!(
            "bad magic {:?}",
            String::from_utf8_lossy(magic)
        )));
    }

    let mut fields = [0u32; FIELD_COUNT];
    for (i, slot) in fields.iter_mut().enumerate() {
        let start = 6 + i * 8;
        *slot = parse_field(&header[start..start + 8], i)?;
    }

    let meta = Metadata {
        ino: fields[0],
        mode: fields[1],
        uid: fields[2],
        gid: fields[3],
        nlink: fields[4],
        mtime: fields[5],
        size: u64::from(fields[6]),
        dev_major: fields[7],
        dev_minor: fields[8],
        rdev_major: fields[9],
        rdev_minor: fields[10],
    };
    Ok((meta, fields[11] as usize))
}

/// Body of a record that passed validation and is ready to be emitted.
enum Body<'a> {
    Empty,
    Inline(&'a [u8]),
    File(File, &'a Path),
}

/// Streaming `newc` encoder. Tracks the output offset for alignment padding.
///
/// A record that fails after its header reached the output leaves the
/// stream undecodable; the writer then refuses every further write.
pub struct NewcWriter<W: Write> {
    inner: W,
    offset: u64,
    failed: Option<String>,
}

impl<W: Write> NewcWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            failed: None,
        }
    }

    /// Bytes written so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Name of the record that broke the stream, if any.
    pub fn failed_record(&self) -> Option<&str> {
        self.failed.as_deref()
    }

    fn put(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn pad(&mut self) -> io::Result<()> {
        let n = pad4(self.offset);
        if n > 0 {
            self.put(&[0u8; 3][..n])?;
        }
        Ok(())
    }

    /// Write one record. File-backed content is opened and streamed here.
    ///
    /// Header overflow, declared size mismatches of in-memory content and
    /// unopenable source files are reported before anything is written.
    pub fn write_record(&mut self, record: &Record) -> Result<(), ArchiveError> {
        if let Some(name) = &self.failed {
            return Err(ArchiveError::ArchiveFailed(name.clone()));
        }
        let header = encode_header(&record.name, &record.meta)?;
        let body = prepare_body(record)?;
        let result = self.emit(record, &header, body);
        if result.is_err() {
            self.failed = Some(record.name.to_string());
        }
        result
    }

    fn emit(
        &mut self,
        record: &Record,
        header: &[u8; HEADER_LEN],
        body: Body<'_>,
    ) -> Result<(), ArchiveError> {
        self.put(header)?;
        self.put(record.name.as_bytes())?;
        self.put(&[0])?;
        self.pad()?;

        match body {
            Body::Empty => {}
            Body::Inline(data) => self.put(data)?,
            Body::File(file, path) => {
                let copied = io::copy(&mut file.take(record.meta.size), &mut self.inner)
                    .map_err(|source| ArchiveError::SourceFileUnreadable {
                        path: path.to_path_buf(),
                        source,
                    })?;
                self.offset += copied;
                if copied != record.meta.size {
                    return Err(ArchiveError::SizeMismatch {
                        name: record.name.to_string(),
                        expected: record.meta.size,
                        actual: copied,
                    });
                }
            }
        }
        self.pad()?;
        Ok(())
    }

    /// Write the trailer record and pad the stream to [`BLOCK_SIZE`].
    pub fn write_trailer(&mut self) -> Result<(), ArchiveError> {
        let trailer = Record {
            name: RecordName::from(TRAILER_NAME),
            meta: Metadata {
                nlink: 1,
                ..Metadata::default()
            },
            content: Content::Empty,
        };
        self.write_record(&trailer)?;

        let rem = self.offset % BLOCK_SIZE;
        let fill = vec![0u8; ((BLOCK_SIZE - rem) % BLOCK_SIZE) as usize];
        let result = self.put(&fill).and_then(|()| self.inner.flush());
        if result.is_err() {
            self.failed = Some(TRAILER_NAME.to_owned());
        }
        result.map_err(ArchiveError::from)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn prepare_body(record: &Record) -> Result<Body<'_>, ArchiveError> {
    let mismatch = |actual: u64| ArchiveError::SizeMismatch {
        name: record.name.to_string(),
        expected: record.meta.size,
        actual,
    };
    match &record.content {
        Content::Empty if record.meta.size != 0 => Err(mismatch(0)),
        Content::Empty => Ok(Body::Empty),
        Content::Inline(data) if data.len() as u64 != record.meta.size => {
            Err(mismatch(data.len() as u64))
        }
        Content::Inline(data) => Ok(Body::Inline(data)),
        Content::File(path) => File::open(path)
            .map(|file| Body::File(file, path))
            .map_err(|source| ArchiveError::SourceFileUnreadable {
                path: path.clone(),
                source,
            }),
    }
}

/// Streaming `newc` decoder. Yields records one at a time, stopping at the
/// trailer; content is read into memory per record, never the whole stream.
pub struct NewcReader<R: Read> {
    inner: R,
    offset: u64,
    finished: bool,
}

impl<R: Read> NewcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            finished: false,
        }
    }

    fn take(&mut self, buf: &mut [u8], what: &str) -> Result<(), ArchiveError> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ArchiveError::MalformedSourceArchive(format!(
                    "truncated {what} at offset {}",
                    self.offset
                ))
            } else {
                ArchiveError::Io(e)
            }
        })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Read exactly `len` bytes without trusting `len` for the allocation.
    fn take_vec(&mut self, len: u64, what: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut buf = Vec::new();
        let read = (&mut self.inner).take(len).read_to_end(&mut buf)?;
        self.offset += read as u64;
        if (read as u64) < len {
            return Err(ArchiveError::MalformedSourceArchive(format!(
                "truncated {what} at offset {}",
                self.offset
            )));
        }
        Ok(buf)
    }

    fn skip_pad(&mut self, what: &str) -> Result<(), ArchiveError> {
        let n = pad4(self.offset);
        if n > 0 {
            let mut pad = [0u8; 3];
            self.take(&mut pad[..n], what)?;
        }
        Ok(())
    }

    /// Read the next record. Returns `Ok(None)` once the trailer is reached.
    /// End of input before the trailer is a malformed archive.
    pub fn next_record(&mut self) -> Result<Option<Record>, ArchiveError> {
        if self.finished {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        if let Err(e) = self.take(&mut header, "header") {
            self.finished = true;
            return Err(match e {
                ArchiveError::MalformedSourceArchive(_) if self.offset == 0 => {
                    ArchiveError::MalformedSourceArchive("empty archive, no trailer".to_owned())
                }
                ArchiveError::MalformedSourceArchive(_) => ArchiveError::MalformedSourceArchive(
                    format!("input ended at offset {} before trailer", self.offset),
                ),
                other => other,
            });
        }

        let result = self.read_body(&header);
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn read_body(&mut self, header: &[u8; HEADER_LEN]) -> Result<Option<Record>, ArchiveError> {
        let (meta, namesize) = decode_header(header)?;
        if namesize == 0 {
            return Err(ArchiveError::MalformedSourceArchive(
                "record with zero-length name".to_owned(),
            ));
        }

        let mut raw_name = self.take_vec(namesize as u64, "name")?;
        self.skip_pad("name padding")?;
        if raw_name.pop() != Some(0) {
            return Err(ArchiveError::MalformedSourceArchive(
                "record name is not NUL-terminated".to_owned(),
            ));
        }
        if raw_name == TRAILER_NAME.as_bytes() {
            return Ok(None);
        }
        let name = RecordName::from(raw_name);

        let data = self.take_vec(meta.size, "record data")?;
        self.skip_pad("data padding")?;

        let content = if data.is_empty() {
            Content::Empty
        } else {
            Content::Inline(data)
        };
        Ok(Some(Record {
            name,
            meta,
            content,
        }))
    }
}

impl<R: Read> Iterator for NewcReader<R> {
    type Item = Result<Record, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
