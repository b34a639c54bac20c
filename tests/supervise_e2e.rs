//! End-to-end supervision tests
//!
//! Each test calls `supervise` directly, which forks this test binary; the
//! forked child sees `Supervision::Continue` and leaves immediately with
//! `_exit` so the harness never runs twice. The analysis tool is replaced by
//! a shell script that records its working directory and argument.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serial_test::serial;

use rvp_supervise::config::SuperviseConfig;
use rvp_supervise::supervisor::{supervise, Supervision};

struct Scratch {
    _dir: tempfile::TempDir,
    tmp_root: PathBuf,
    analysis_out: PathBuf,
}

impl Scratch {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let tmp_root = base.join("root");
        fs::create_dir(&tmp_root).unwrap();
        Self {
            _dir: dir,
            tmp_root,
            analysis_out: base.join("analysis.out"),
        }
    }

    /// Stand-in for rvpa: records its working directory and first argument.
    fn analysis_script(&self) -> String {
        let path = self.analysis_out.with_file_name("rvpa-stub.sh");
        let script = format!(
            "#!/bin/sh\npwd > {out}\necho \"$1\" >> {out}\n",
            out = self.analysis_out.display()
        );
        fs::write(&path, script).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn config(&self, trace_var: &str, analysis_program: String) -> SuperviseConfig {
        SuperviseConfig {
            trace_only: false,
            debug: false,
            tmp_root: self.tmp_root.clone(),
            trace_var: trace_var.to_string(),
            analysis_program,
        }
    }
}

#[test]
#[serial]
fn supervised_run_analyzes_and_cleans_up() {
    let scratch = Scratch::new();
    let trace_var = "RVP_TRACE_FILE_E2E_FULL";
    let config = scratch.config(trace_var, scratch.analysis_script());

    match supervise(&config, None).unwrap() {
        // Forked instrumented "program": exit 0 without touching the harness.
        Supervision::Continue => unsafe { libc::_exit(0) },
        Supervision::Exit(code) => assert_eq!(code, 0),
    }

    // The workspace was fully removed.
    assert_eq!(fs::read_dir(&scratch.tmp_root).unwrap().count(), 0);

    // The trace path was exported as <workspace>/rvpredict.trace with the
    // workspace named after this binary.
    let trace = std::env::var(trace_var).unwrap();
    let trace = Path::new(&trace);
    assert_eq!(trace.file_name().unwrap(), "rvpredict.trace");
    let workspace = trace.parent().unwrap();
    assert!(workspace.starts_with(&scratch.tmp_root));
    let exe = std::env::current_exe().unwrap();
    let exe_base = exe.file_name().unwrap().to_str().unwrap();
    let workspace_name = workspace.file_name().unwrap().to_str().unwrap();
    assert!(
        workspace_name.starts_with(&format!("rvprt-{}.", exe_base)),
        "unexpected workspace name {}",
        workspace_name
    );

    // The analysis tool ran inside the workspace with the binary path as its
    // single argument.
    let recorded = fs::read_to_string(&scratch.analysis_out).unwrap();
    let mut lines = recorded.lines();
    assert_eq!(Path::new(lines.next().unwrap()), workspace);
    assert_eq!(Path::new(lines.next().unwrap()), exe);

    std::env::remove_var(trace_var);
}

#[test]
#[serial]
fn instrumented_exit_code_is_propagated() {
    let scratch = Scratch::new();
    let trace_var = "RVP_TRACE_FILE_E2E_CODE";
    let config = scratch.config(trace_var, "true".to_string());

    match supervise(&config, None).unwrap() {
        Supervision::Continue => unsafe { libc::_exit(7) },
        Supervision::Exit(code) => assert_eq!(code, 7),
    }

    assert_eq!(fs::read_dir(&scratch.tmp_root).unwrap().count(), 0);
    std::env::remove_var(trace_var);
}

#[test]
#[serial]
fn missing_analysis_tool_does_not_disturb_the_exit_status() {
    let scratch = Scratch::new();
    let trace_var = "RVP_TRACE_FILE_E2E_NOTOOL";
    let config = scratch.config(trace_var, "rvp-supervise-no-such-tool".to_string());

    match supervise(&config, None).unwrap() {
        Supervision::Continue => unsafe { libc::_exit(3) },
        Supervision::Exit(code) => assert_eq!(code, 3),
    }

    assert_eq!(fs::read_dir(&scratch.tmp_root).unwrap().count(), 0);
    std::env::remove_var(trace_var);
}
