//! Process-wide supervision settings, read from the environment once at startup

use std::env;
use std::path::PathBuf;

/// Environment variable that switches the supervisor into trace-only mode.
pub const TRACE_ONLY_VAR: &str = "RVP_TRACE_ONLY";

/// Environment variable that enables verbose diagnostics on stderr.
pub const DEBUG_VAR: &str = "RVP_DEBUG";

/// Environment variable through which the trace-file path is exported to the
/// instrumented child.
pub const TRACE_FILE_VAR: &str = "RVP_TRACE_FILE";

/// Fixed name of the trace file inside the workspace directory.
pub const TRACE_FILE_NAME: &str = "rvpredict.trace";

/// Prefix of the per-run workspace directory name.
pub const WORKSPACE_PREFIX: &str = "rvprt-";

/// Name of the external analysis program, located via PATH.
pub const ANALYSIS_PROGRAM: &str = "rvpa";

/// Immutable configuration for one supervised run.
///
/// Built once from the environment before supervision starts and passed by
/// reference into the supervisor. All fields are plain data so embedders and
/// tests can construct custom configurations.
#[derive(Debug, Clone)]
pub struct SuperviseConfig {
    /// When true, supervision is skipped entirely and the caller's own main
    /// routine proceeds, dropping a trace file into the working directory.
    pub trace_only: bool,
    /// When true, `main_entry` initializes a tracing subscriber on stderr.
    pub debug: bool,
    /// Directory under which the per-run workspace is created.
    pub tmp_root: PathBuf,
    /// Name of the environment variable carrying the trace-file path.
    pub trace_var: String,
    /// Name of the analysis program forked after the instrumented child.
    pub analysis_program: String,
}

impl SuperviseConfig {
    /// Read the configuration from the environment.
    ///
    /// `RVP_TRACE_ONLY=yes` enables trace-only mode and `RVP_DEBUG=yes`
    /// enables verbose diagnostics; everything else takes its fixed default.
    pub fn from_env() -> Self {
        Self {
            trace_only: env_flag(TRACE_ONLY_VAR),
            debug: env_flag(DEBUG_VAR),
            tmp_root: env::temp_dir(),
            trace_var: TRACE_FILE_VAR.to_string(),
            analysis_program: ANALYSIS_PROGRAM.to_string(),
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var_os(name).is_some_and(|value| value == "yes")
}
