use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Scratch directories alive in this process, removed on a forced exit.
static LIVE_SCRATCH: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// First Ctrl-C asks the running assembly to stop at its next step
/// boundary; a second one removes live scratch directories and exits.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            remove_dirs(&live_scratch());
            std::process::exit(130);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\ninterrupt received, stopping after the current step...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

pub(crate) fn track_scratch(path: &Path) {
    LIVE_SCRATCH
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(path.to_path_buf());
}

pub(crate) fn untrack_scratch(path: &Path) {
    LIVE_SCRATCH
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|p| p != path);
}

pub(crate) fn live_scratch() -> Vec<PathBuf> {
    LIVE_SCRATCH
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn remove_dirs(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_dir_all(path) {
            eprintln!("failed to remove {}: {e}", path.display());
        }
    }
}
