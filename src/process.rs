//! Child-process creation and waiting
//!
//! One fork/wait primitive with two roles: either the child returns control
//! to the caller (the instrumented program continuing its own main routine)
//! or the child's image is replaced by an external program.

use std::ffi::OsStr;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{chdir, fork, ForkResult, Pid};

use crate::signals::SignalGuard;

/// Exit code the supervisor reports when the instrumented program was
/// terminated by a signal, following xargs(1).
pub const SIGNALED_EXIT_CODE: i32 = 125;

/// The classified result of waiting on a terminated child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    /// The child called `exit` with the given code.
    Exited(i32),
    /// The child was terminated by the given signal.
    Signaled(Signal),
}

impl ChildOutcome {
    /// Translate the outcome into the supervisor's own exit code.
    pub fn exit_code(self) -> i32 {
        match self {
            ChildOutcome::Signaled(_) => SIGNALED_EXIT_CODE,
            ChildOutcome::Exited(code) => code,
        }
    }
}

/// Which side of the fork the caller is on after [`run_as_continuation`].
#[derive(Debug)]
pub enum Continuation {
    /// This process is the child; the caller's own main routine should run.
    Child,
    /// This process is the parent; the child has terminated.
    Parent(ChildOutcome),
}

/// Fork a child that continues the caller's own control flow.
///
/// Must be called while `guard` holds the fixed signal set blocked; the fork
/// itself then cannot race with a delivered signal. The child restores the
/// saved mask before returning so the instrumented program runs with its
/// normal signal disposition. The parent blocks until the child terminates.
pub fn run_as_continuation(guard: &SignalGuard) -> Result<Continuation> {
    match unsafe { fork() }.context("could not fork a supervised process")? {
        ForkResult::Child => {
            guard.restore()?;
            Ok(Continuation::Child)
        }
        ForkResult::Parent { child } => {
            let outcome = wait_for(child, "instrumented program")?;
            Ok(Continuation::Parent(outcome))
        }
    }
}

/// Fork a child that changes to `workdir` and executes `program` with `args`.
///
/// The child's image is replaced entirely; if the directory change or the
/// exec fails there is no way to return control upward, so the child reports
/// the failure on stderr and exits non-zero. The parent blocks until the
/// child terminates.
pub fn run_external(program: &str, args: &[&OsStr], workdir: &Path) -> Result<ChildOutcome> {
    match unsafe { fork() }.context("could not fork an analysis process")? {
        ForkResult::Child => {
            if let Err(err) = chdir(workdir) {
                eprintln!(
                    "rvp-supervise could not change to {}: {}",
                    workdir.display(),
                    err
                );
                unsafe { libc::_exit(1) };
            }
            let err = Command::new(program).args(args).exec();
            // exec only returns on failure
            eprintln!("rvp-supervise could not start {}: {}", program, err);
            unsafe { libc::_exit(1) };
        }
        ForkResult::Parent { child } => wait_for(child, "analysis process"),
    }
}

/// Wait for `child` to terminate, retrying transparently when the wait is
/// interrupted by a delivered signal.
fn wait_for(child: Pid, role: &str) -> Result<ChildOutcome> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ChildOutcome::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(ChildOutcome::Signaled(signal)),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed unexpectedly while waiting for the {}", role)
                });
            }
        }
    }
}
