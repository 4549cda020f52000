use crate::record::{Record, RecordName};

/// Name of the program the kernel runs from an initramfs.
pub const INIT_NAME: &str = "init";
/// Name an ingested `init` is moved to when a new one will be written.
pub const RENAMED_INIT_NAME: &str = "inito";

/// A pure, stateless mapping from one record to another.
///
/// Transforms never add, drop, or reorder records; they only rewrite the
/// record they are given.
pub trait RecordTransform: Send + Sync {
    fn apply(&self, record: Record) -> Record;
}

impl<F> RecordTransform for F
where
    F: Fn(Record) -> Record + Send + Sync,
{
    fn apply(&self, record: Record) -> Record {
        self(record)
    }
}

/// Leaves records untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl RecordTransform for Identity {
    fn apply(&self, record: Record) -> Record {
        record
    }
}

/// Normalizes metadata so identical content yields byte-identical archives.
///
/// Canonical values: inode 0, link count 1, mtime 0, uid/gid 0, and the
/// containing device 0:0. Mode, size, rdev (device node identity), and
/// content are preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reproducible;

impl RecordTransform for Reproducible {
    fn apply(&self, mut record: Record) -> Record {
        record.meta.ino = 0;
        record.meta.nlink = 1;
        record.meta.mtime = 0;
        record.meta.uid = 0;
        record.meta.gid = 0;
        record.meta.dev_major = 0;
        record.meta.dev_minor = 0;
        record
    }
}

/// Renames a record whose name is byte-for-byte `from`.
#[derive(Debug, Clone)]
pub struct RenameRecord {
    from: RecordName,
    to: RecordName,
}

impl RenameRecord {
    pub fn new(from: impl Into<RecordName>, to: impl Into<RecordName>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl RecordTransform for RenameRecord {
    fn apply(&self, mut record: Record) -> Record {
        if record.name == self.from {
            record.name.clone_from(&self.to);
        }
        record
    }
}

/// Applies transforms left to right.
#[derive(Default)]
pub struct TransformChain {
    steps: Vec<Box<dyn RecordTransform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(mut self, step: impl RecordTransform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl RecordTransform for TransformChain {
    fn apply(&self, record: Record) -> Record {
        self.steps.iter().fold(record, |r, step| step.apply(r))
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChain")
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// The transform applied to records ingested from a seed archive.
///
/// When a new init program will be written (`keep_existing_init == false`),
/// an ingested `init` is renamed to `inito` before normalization. Otherwise
/// records only pass through [`Reproducible`].
pub fn seed_archive_transform(keep_existing_init: bool) -> TransformChain {
    let chain = TransformChain::new();
    let chain = if keep_existing_init {
        chain
    } else {
        chain.then(RenameRecord::new(INIT_NAME, RENAMED_INIT_NAME))
    };
    chain.then(Reproducible)
}
