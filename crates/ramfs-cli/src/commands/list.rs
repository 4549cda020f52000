use super::{json_pretty, EXIT_SUCCESS};
use console::Style;
use ramfs_archive::record::{S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFSOCK};
use ramfs_archive::{Content, NewcReader, Record};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ListEntry {
    name: String,
    mode: String,
    uid: u32,
    gid: u32,
    mtime: u32,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

impl From<&Record> for ListEntry {
    fn from(r: &Record) -> Self {
        let target = match (&r.content, r.meta.is_symlink()) {
            (Content::Inline(bytes), true) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        };
        Self {
            name: r.name.to_string(),
            mode: format_mode(r.meta.mode),
            uid: r.meta.uid,
            gid: r.meta.gid,
            mtime: r.meta.mtime,
            size: r.meta.size,
            target,
        }
    }
}

/// `ls -l` style mode string, e.g. `drwxr-xr-x`.
fn format_mode(mode: u32) -> String {
    let kind = match mode & ramfs_archive::record::S_IFMT {
        S_IFDIR => 'd',
        S_IFLNK => 'l',
        S_IFCHR => 'c',
        S_IFBLK => 'b',
        S_IFIFO => 'p',
        S_IFSOCK => 's',
        _ => '-',
    };
    let mut s = String::with_capacity(10);
    s.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}

pub fn run(archive: &Path, json: bool) -> Result<u8, String> {
    let file =
        File::open(archive).map_err(|e| format!("failed to open {}: {e}", archive.display()))?;
    let records = NewcReader::new(BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("archive error: {}: {e}", archive.display()))?;
    let entries: Vec<ListEntry> = records.iter().map(ListEntry::from).collect();

    if json {
        println!("{}", json_pretty(&entries)?);
        return Ok(EXIT_SUCCESS);
    }

    let dir = Style::new().blue().bold();
    let link = Style::new().cyan();
    for e in &entries {
        let name = match (&e.target, e.mode.starts_with('d')) {
            (Some(t), _) => format!("{} -> {t}", link.apply_to(&e.name)),
            (None, true) => dir.apply_to(&e.name).to_string(),
            (None, false) => e.name.clone(),
        };
        println!(
            "{} {:>5}/{:<5} {:>10} {name}",
            e.mode, e.uid, e.gid, e.size
        );
    }
    println!("{} records", entries.len());
    Ok(EXIT_SUCCESS)
}
