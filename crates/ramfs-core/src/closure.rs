use crate::CoreError;
use ramfs_schema::{ImportPath, Package, Provenance};
use ramfs_toolchain::Toolchain;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::path::PathBuf;
use tracing::{debug, warn};

/// De-duplicating sequence that remembers first-insertion order.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    seen: HashSet<T>,
    items: Vec<T>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> OrderedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the item was not present before.
    pub fn insert(&mut self, item: T) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    pub fn contains(&self, item: &T) -> bool {
        self.seen.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

/// The two file manifests produced by a closure, plus what went into them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifests {
    /// Paths relative to GOROOT.
    pub system: Vec<PathBuf>,
    /// Paths relative to GOPATH.
    pub user: Vec<PathBuf>,
    /// Every package whose files were collected, seeds first, then
    /// dependencies in discovery order.
    pub packages: Vec<ImportPath>,
    /// Seeds that could not be resolved and were skipped.
    pub skipped_seeds: Vec<ImportPath>,
}

impl Manifests {
    pub fn file_count(&self) -> usize {
        self.system.len() + self.user.len()
    }
}

/// Computes the transitive dependency closure of a set of seed packages.
pub struct ClosureResolver<'a> {
    toolchain: &'a dyn Toolchain,
}

impl<'a> ClosureResolver<'a> {
    pub fn new(toolchain: &'a dyn Toolchain) -> Self {
        Self { toolchain }
    }

    /// Resolve `seeds` and partition every reachable package's source files
    /// by provenance.
    ///
    /// Seeds are best-effort: a seed that cannot be looked up is logged and
    /// skipped. Dependencies are mandatory: any failed lookup aborts with
    /// [`CoreError::FatalClosure`]. Each import path is queried at most once
    /// as a dependency, so cycles terminate.
    pub fn resolve(&self, seeds: &[ImportPath]) -> Result<Manifests, CoreError> {
        let mut included: OrderedSet<ImportPath> = OrderedSet::new();
        let mut pending: VecDeque<ImportPath> = VecDeque::new();
        let mut resolved: Vec<Package> = Vec::new();
        let mut skipped = Vec::new();

        for seed in seeds {
            if included.contains(seed) {
                continue;
            }
            match self.toolchain.list_package(seed) {
                Ok(package) => {
                    included.insert(seed.clone());
                    pending.extend(package.deps.iter().cloned());
                    resolved.push(package);
                }
                Err(e) => {
                    warn!("can't list seed package {seed}, ignoring: {e}");
                    skipped.push(seed.clone());
                }
            }
        }

        while let Some(import_path) = pending.pop_front() {
            if !included.insert(import_path.clone()) {
                continue;
            }
            let package = self.toolchain.list_package(&import_path).map_err(|source| {
                CoreError::FatalClosure {
                    import_path: import_path.clone(),
                    source,
                }
            })?;
            pending.extend(
                package
                    .deps
                    .iter()
                    .filter(|&dep| !included.contains(dep))
                    .cloned(),
            );
            resolved.push(package);
        }

        let mut system = OrderedSet::new();
        let mut user = OrderedSet::new();
        for package in &resolved {
            let target = match package.provenance() {
                Provenance::SystemRoot => &mut system,
                Provenance::UserTree => &mut user,
            };
            for file in package.root_relative_files() {
                target.insert(file);
            }
        }

        debug!(
            "closure: {} packages, {} system files, {} user files, {} seeds skipped",
            resolved.len(),
            system.len(),
            user.len(),
            skipped.len()
        );

        Ok(Manifests {
            system: system.into_vec(),
            user: user.into_vec(),
            packages: resolved.into_iter().map(|p| p.import_path).collect(),
            skipped_seeds: skipped,
        })
    }
}
