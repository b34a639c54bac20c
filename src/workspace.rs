//! Temporary-workspace lifecycle
//!
//! Each supervised run owns one uniquely named directory under the temp root
//! that holds the trace file. Teardown walks the tree physically (symlinks
//! are not followed) and removes everything, tolerating entries that vanish
//! under it.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::unistd::mkdtemp;

use crate::config;

/// A per-run temporary directory and the trace-file path inside it.
///
/// The trace file is always `<dir>/rvpredict.trace`. The directory exists for
/// the whole interval between [`Workspace::create`] and
/// [`Workspace::teardown`].
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    trace_file: PathBuf,
}

impl Workspace {
    /// Create a unique workspace directory `<root>/rvprt-<basename>.XXXXXX`.
    pub fn create(root: &Path, basename: &OsStr) -> Result<Self> {
        let mut name = OsString::from(config::WORKSPACE_PREFIX);
        name.push(basename);
        name.push(".XXXXXX");
        let template = root.join(name);
        let dir = mkdtemp(&template).with_context(|| {
            format!(
                "could not create a temporary directory from template {}",
                template.display()
            )
        })?;
        let trace_file = dir.join(config::TRACE_FILE_NAME);
        Ok(Self { dir, trace_file })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the instrumented program's tracing layer writes to.
    pub fn trace_file(&self) -> &Path {
        &self.trace_file
    }

    /// Remove the workspace directory and everything under it.
    ///
    /// Individual entries that cannot be unlinked and traversal errors are
    /// warnings; the walk still runs to completion. Entries already missing
    /// are tolerated silently, so a second teardown of an already-removed
    /// workspace succeeds. Failing to remove a directory after its
    /// descendants were visited is an error: the tree was not emptied.
    pub fn teardown(&self) -> Result<()> {
        for event in walk(&self.dir) {
            match event {
                WalkEvent::File(path) | WalkEvent::Symlink(path) => {
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                        Err(err) => {
                            tracing::warn!(
                                "encountered an error at non-directory path {}: {}",
                                path.display(),
                                err
                            );
                        }
                    }
                }
                WalkEvent::Error(path, err) => {
                    tracing::warn!("encountered an error at path {}: {}", path.display(), err);
                }
                WalkEvent::DirEnter(_) => {}
                WalkEvent::DirLeave(path) => {
                    fs::remove_dir(&path).with_context(|| {
                        format!("could not remove the directory {}", path.display())
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// One step of a physical directory walk.
#[derive(Debug)]
pub(crate) enum WalkEvent {
    /// A regular file or other non-directory, non-symlink entry.
    File(PathBuf),
    /// A symbolic link, dangling or not; never followed.
    Symlink(PathBuf),
    /// A directory, before any of its entries.
    DirEnter(PathBuf),
    /// A directory, after all of its entries.
    DirLeave(PathBuf),
    /// An entry that could not be examined or a directory that could not be
    /// read.
    Error(PathBuf, io::Error),
}

/// Lazily walk `root`, yielding directories both pre- and post-order.
pub(crate) fn walk(root: &Path) -> Walk {
    Walk {
        stack: vec![Task::Visit(root.to_path_buf())],
        pending: VecDeque::new(),
    }
}

enum Task {
    Visit(PathBuf),
    Leave(PathBuf),
}

pub(crate) struct Walk {
    stack: Vec<Task>,
    pending: VecDeque<WalkEvent>,
}

impl Iterator for Walk {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        while let Some(task) = self.stack.pop() {
            match task {
                Task::Visit(path) => {
                    let meta = match fs::symlink_metadata(&path) {
                        Ok(meta) => meta,
                        Err(err) => return Some(WalkEvent::Error(path, err)),
                    };
                    let file_type = meta.file_type();
                    if file_type.is_symlink() {
                        return Some(WalkEvent::Symlink(path));
                    }
                    if !file_type.is_dir() {
                        return Some(WalkEvent::File(path));
                    }
                    self.stack.push(Task::Leave(path.clone()));
                    match fs::read_dir(&path) {
                        Ok(entries) => {
                            let mut children = Vec::new();
                            for entry in entries {
                                match entry {
                                    Ok(entry) => children.push(entry.path()),
                                    Err(err) => {
                                        self.pending
                                            .push_back(WalkEvent::Error(path.clone(), err));
                                    }
                                }
                            }
                            // Reversed so entries are visited in directory order.
                            for child in children.into_iter().rev() {
                                self.stack.push(Task::Visit(child));
                            }
                        }
                        Err(err) => {
                            self.pending.push_back(WalkEvent::Error(path.clone(), err));
                        }
                    }
                    return Some(WalkEvent::DirEnter(path));
                }
                Task::Leave(path) => return Some(WalkEvent::DirLeave(path)),
            }
        }
        None
    }
}
