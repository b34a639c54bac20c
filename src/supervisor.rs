//! Supervision entry point
//!
//! Called from the instrumented program's entry point before its own main
//! routine. Unless trace-only mode is active the supervisor takes over: it
//! forks the program as a child, waits for it, forks the analysis tool
//! against the produced trace file, tears the workspace down, and exits with
//! a status derived from the instrumented program's outcome.

use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::SuperviseConfig;
use crate::process::{run_as_continuation, run_external, Continuation};
use crate::self_path::resolve_self_path;
use crate::signals::SignalGuard;
use crate::workspace::Workspace;

/// What the caller should do after [`supervise`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervision {
    /// Proceed into the caller's own main routine. Returned in trace-only
    /// mode and in the forked instrumented child.
    Continue,
    /// Supervision ran to completion; exit with this code.
    Exit(i32),
}

/// Initialize tracing subscriber for debug output
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the supervise-then-analyze flow.
///
/// `argv0` is the invocation name, used as a fallback when the path of the
/// running executable cannot be read from the per-process link.
pub fn supervise(config: &SuperviseConfig, argv0: Option<&Path>) -> Result<Supervision> {
    // Trace-only mode: resume the main routine immediately so a trace file
    // is dropped into the working directory.
    if config.trace_only {
        return Ok(Supervision::Continue);
    }

    let binpath = resolve_self_path(argv0)?.ok_or_else(|| {
        anyhow!("could not find a path to the executable binary that it was running")
    })?;

    let basename = binpath.file_name().unwrap_or(binpath.as_os_str());
    let workspace = Workspace::create(&config.tmp_root, basename)?;
    tracing::debug!("created workspace {}", workspace.dir().display());

    // The instrumented child and its tracing layer find the trace file here.
    env::set_var(&config.trace_var, workspace.trace_file());

    let guard = SignalGuard::block()?;
    let first = match run_as_continuation(&guard)? {
        Continuation::Child => return Ok(Supervision::Continue),
        Continuation::Parent(outcome) => outcome,
    };
    guard.restore()?;
    tracing::debug!("instrumented program finished: {:?}", first);

    // The analysis outcome never feeds the exit status; the final status
    // reflects the instrumented program.
    let analysis = run_external(
        &config.analysis_program,
        &[binpath.as_os_str()],
        workspace.dir(),
    )?;
    tracing::debug!("analysis process finished: {:?}", analysis);

    workspace.teardown()?;

    Ok(Supervision::Exit(first.exit_code()))
}

/// Process-terminating wrapper around [`supervise`].
///
/// Returns normally only when the caller's own main routine should run;
/// otherwise exits the process, printing a diagnostic first when supervision
/// failed.
pub fn main_entry(config: &SuperviseConfig, argv0: Option<&Path>) {
    if config.debug {
        init_tracing();
    }
    match supervise(config, argv0) {
        Ok(Supervision::Continue) => {}
        Ok(Supervision::Exit(code)) => std::process::exit(code),
        Err(err) => {
            eprintln!("rvp-supervise: {:#}", err);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_trace_only_mode_has_no_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let config = SuperviseConfig {
            trace_only: true,
            debug: false,
            tmp_root: root.path().to_path_buf(),
            trace_var: "RVP_TRACE_FILE_TRACE_ONLY_TEST".to_string(),
            analysis_program: "rvpa".to_string(),
        };

        let result = supervise(&config, Some(Path::new("/usr/bin/prog"))).unwrap();

        assert_eq!(result, Supervision::Continue);
        // No workspace was created and no trace path was exported.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
        assert!(env::var_os(&config.trace_var).is_none());
    }
}
