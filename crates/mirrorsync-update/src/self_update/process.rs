//! Process and filesystem seams for the self-update handshake
//!
//! The coordinator never touches processes or the executable directly; it
//! goes through these traits so the handshake can be driven in tests.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use sysinfo::System;
use tempfile::NamedTempFile;
use tracing::debug;

/// Answers "is a process with this name running"
pub trait ProcessProbe: Send + Sync {
    /// `name` is an executable file name such as `mirrorsync` or
    /// `_mirrorsync.exe`. The calling process itself never counts.
    fn is_running(&self, name: &str) -> bool;
}

/// Replaces and removes executable images
pub trait ImageReplacer: Send + Sync {
    /// Make `target` a copy of `source`
    fn replace(&self, source: &Path, target: &Path) -> io::Result<()>;

    /// Delete `path`; a missing file is not an error
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Starts a detached process
pub trait Launcher: Send + Sync {
    fn launch(&self, program: &Path, args: &[&str]) -> io::Result<()>;
}

/// Process table lookup through `sysinfo`
///
/// Matches on the reported process name or on the file name of the
/// process executable, since some platforms truncate process names.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessProbe;

impl ProcessProbe for SystemProcessProbe {
    fn is_running(&self, name: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes();
        let own_pid = sysinfo::get_current_pid().ok();

        system.processes().values().any(|process| {
            if Some(process.pid()) == own_pid {
                return false;
            }
            process.name() == name
                || process
                    .exe()
                    .and_then(Path::file_name)
                    .is_some_and(|file| file == OsStr::new(name))
        })
    }
}

/// Copies through a sibling temporary file, then renames over the target
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageReplacer;

impl ImageReplacer for FsImageReplacer {
    fn replace(&self, source: &Path, target: &Path) -> io::Result<()> {
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        let mut input = fs::File::open(source)?;
        io::copy(&mut input, temp.as_file_mut())?;
        temp.as_file().sync_all()?;

        let permissions = fs::metadata(source)?.permissions();
        fs::set_permissions(temp.path(), permissions)?;

        temp.persist(target).map_err(|e| e.error)?;
        debug!("Replaced {:?} with {:?}", target, source);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Spawns with `std::process::Command` in the program's directory
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn launch(&self, program: &Path, args: &[&str]) -> io::Result<()> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = program.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        let child = command.spawn()?;
        debug!(pid = child.id(), "Launched {:?} {:?}", program, args);
        Ok(())
    }
}
