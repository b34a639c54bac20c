//! rvp-supervise - Process supervisor for instrumented trace-and-analyze runs
//!
//! This library provides the supervision layer that an instrumented program's
//! entry point calls before its own main routine: unless trace-only mode is
//! active, the supervisor forks the program as a child, waits for it, runs
//! the external analysis tool against the trace file the child produced, and
//! exits with a status derived from the child's outcome.

pub mod config;
pub mod process;
pub mod self_path;
pub mod signals;
pub mod supervisor;
pub mod workspace;
