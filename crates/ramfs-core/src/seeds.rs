use crate::closure::OrderedSet;
use crate::CoreError;
use ramfs_schema::{ConfigError, ImportPath, DEFAULT_PACKAGE_PATTERN};
use std::path::Path;
use tracing::{debug, warn};

/// Expand GOPATH-relative glob patterns into seed import paths.
///
/// Each match is made relative to `<gopath>/src`; matches outside it are
/// dropped with a warning. An empty pattern list means the default command
/// set. Results keep pattern order, then glob order, without duplicates.
pub fn expand_patterns(gopath: &Path, patterns: &[String]) -> Result<Vec<ImportPath>, CoreError> {
    let defaults = [DEFAULT_PACKAGE_PATTERN.to_owned()];
    let patterns = if patterns.is_empty() {
        &defaults[..]
    } else {
        patterns
    };

    let src = gopath.join("src");
    let mut seeds = OrderedSet::new();

    for pattern in patterns {
        let full = gopath.join(pattern);
        let full = full.to_str().ok_or_else(|| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            detail: "path is not valid UTF-8".to_owned(),
        })?;
        let matches = glob::glob(full).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            detail: e.to_string(),
        })?;

        let mut found = 0;
        for entry in matches {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!("skipping unreadable match: {e}");
                    continue;
                }
            };
            let Ok(rel) = path.strip_prefix(&src) else {
                warn!("{} is not under {}, ignoring", path.display(), src.display());
                continue;
            };
            let import_path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if import_path.is_empty() {
                continue;
            }
            seeds.insert(ImportPath::from(import_path));
            found += 1;
        }

        if found == 0 {
            warn!("pattern {pattern} matched nothing under {}", gopath.display());
        }
    }

    Ok(seeds.into_vec())
}
