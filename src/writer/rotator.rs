// Size based log file rotation.
// The active file keeps its name; when the next entry would push it past the
// rotation size, `name` becomes `name.1`, `name.1` becomes `name.2` and so on,
// and anything beyond `max_rotation` is deleted.

use super::{LogWriter, write_all_parts};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_ROTATION_SIZE: u64 = 1024 * 1024; // 1 MiB
pub const DEFAULT_MAX_ROTATION: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Size in bytes at which the active file is rotated.
    pub rotation_size: u64,
    /// Number of rotated files kept next to the active one.
    pub max_rotation: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            rotation_size: DEFAULT_ROTATION_SIZE,
            max_rotation: DEFAULT_MAX_ROTATION,
        }
    }
}

struct State {
    file: Option<File>,
    size: u64,
    closed: bool,
}

pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    state: Mutex<State>,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            policy,
            state: Mutex::new(State {
                file: Some(file),
                size,
                closed: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Path of the `n`th rotated file, e.g. `lantern.log.3`.
    pub fn rotated_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Flushes and closes the active file. Fails if already closed.
    pub fn close(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(io::Error::other(format!(
                "log file {} already closed",
                self.path.display()
            )));
        }
        state.closed = true;
        match state.file.take() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }

    fn rotate(&self, state: &mut State) -> io::Result<()> {
        // Handles must be released before renaming on some platforms.
        drop(state.file.take());
        state.size = 0;

        self.shift_rotated_files()?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        state.file = Some(file);
        Ok(())
    }

    fn shift_rotated_files(&self) -> io::Result<()> {
        if self.policy.max_rotation == 0 {
            return remove_if_exists(&self.path);
        }

        remove_if_exists(&self.rotated_path(self.policy.max_rotation))?;
        for n in (1..self.policy.max_rotation).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                fs::rename(&from, self.rotated_path(n + 1))?;
            }
        }
        if self.path.exists() {
            fs::rename(&self.path, self.rotated_path(1))?;
        }
        Ok(())
    }
}

impl LogWriter for RotatingFile {
    fn write(&self, entry: &[u8]) -> io::Result<usize> {
        self.write_parts(&[entry])
    }

    fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
        let total: u64 = parts.iter().map(|p| p.len() as u64).sum();
        let mut state = self.state.lock();
        if state.closed {
            return Err(io::Error::other(format!(
                "log file {} is closed",
                self.path.display()
            )));
        }

        let mut rotate_err = None;
        if state.size > 0 && state.size + total > self.policy.rotation_size {
            if let Err(e) = self.rotate(&mut state) {
                rotate_err = Some(e);
            }
        }

        if state.file.is_none() {
            let file = open_append(&self.path)?;
            state.size = file.metadata()?.len();
            state.file = Some(file);
        }

        let State { file, size, .. } = &mut *state;
        let Some(file) = file.as_mut() else {
            return Err(io::Error::other("log file unavailable"));
        };
        let written = write_all_parts(file, parts)?;
        *size += written as u64;

        match rotate_err {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}

impl std::fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFile")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
