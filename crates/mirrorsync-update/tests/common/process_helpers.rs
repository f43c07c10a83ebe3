//! Test doubles for the self-update process seams

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mirrorsync_update::self_update::{FsImageReplacer, ImageReplacer, Launcher, ProcessProbe};

/// Reports a process as running for the first `polls` queries
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    remaining: Arc<AtomicUsize>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProbe {
    pub fn running_for(polls: usize) -> Self {
        Self {
            remaining: Arc::new(AtomicUsize::new(polls)),
            queried: Arc::default(),
        }
    }

    pub fn never_exits() -> Self {
        Self::running_for(usize::MAX)
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

impl ProcessProbe for ScriptedProbe {
    fn is_running(&self, name: &str) -> bool {
        self.queried.lock().unwrap().push(name.to_string());
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Records launches instead of spawning
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    calls: Arc<Mutex<Vec<(PathBuf, Vec<String>)>>>,
}

impl RecordingLauncher {
    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, program: &Path, args: &[&str]) -> io::Result<()> {
        self.calls.lock().unwrap().push((
            program.to_path_buf(),
            args.iter().map(|a| a.to_string()).collect(),
        ));
        Ok(())
    }
}

/// Real filesystem replacement that also records targets
#[derive(Clone, Default)]
pub struct RecordingReplacer {
    replaced: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    removed: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingReplacer {
    pub fn replaced(&self) -> Vec<(PathBuf, PathBuf)> {
        self.replaced.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().unwrap().clone()
    }
}

impl ImageReplacer for RecordingReplacer {
    fn replace(&self, source: &Path, target: &Path) -> io::Result<()> {
        self.replaced
            .lock()
            .unwrap()
            .push((source.to_path_buf(), target.to_path_buf()));
        FsImageReplacer.replace(source, target)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.removed.lock().unwrap().push(path.to_path_buf());
        FsImageReplacer.remove(path)
    }
}
