//! Self-executable path discovery
//!
//! Reads the `/proc/self/exe` symbolic link to find the absolute path of the
//! running binary. The link target's length is unknown in advance, so the
//! read retries with a doubling buffer until the target fits.

use std::ffi::{CString, OsString};
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::unistd::{pathconf, PathconfVar};

const SELF_EXE: &str = "/proc/self/exe";

/// Smallest buffer the first read attempt uses.
const MIN_BUF: usize = 4;

/// Resolve the absolute path of the running executable.
///
/// Returns the link target of `/proc/self/exe`, or `fallback` unchanged when
/// the link does not exist (the platform does not expose it). `None` means
/// the path cannot be determined at all. Any other failure to read the link
/// is an error.
pub fn resolve_self_path(fallback: Option<&Path>) -> Result<Option<PathBuf>> {
    let name_max = match pathconf(SELF_EXE, PathconfVar::NAME_MAX) {
        Ok(Some(max)) => max as usize,
        // No fixed limit reported; allow growth up to the readlink cap.
        Ok(None) => isize::MAX as usize,
        Err(Errno::ENOENT) => return Ok(fallback.map(Path::to_path_buf)),
        Err(err) => {
            return Err(err).context("could not find out the maximum filename length");
        }
    };
    match read_link_growing(Path::new(SELF_EXE), MIN_BUF.min(name_max), name_max)? {
        Resolution::Resolved(path) => Ok(Some(path)),
        Resolution::NoSuchLink => Ok(fallback.map(Path::to_path_buf)),
    }
}

#[derive(Debug)]
enum Resolution {
    Resolved(PathBuf),
    NoSuchLink,
}

/// Read a symbolic link whose target length is unknown.
///
/// Starts with a buffer of `initial` bytes and doubles it (clamped to `max`,
/// never exceeding `isize::MAX`) while `readlink(2)` reports a target that
/// filled the whole buffer. Callers never see the retry mechanics.
fn read_link_growing(link: &Path, initial: usize, max: usize) -> Result<Resolution> {
    let clink = CString::new(link.as_os_str().as_bytes())
        .with_context(|| format!("link path {} contains a NUL byte", link.display()))?;
    let mut size = initial.max(1);
    loop {
        let mut buf = vec![0u8; size + 1];
        let nread =
            unsafe { libc::readlink(clink.as_ptr(), buf.as_mut_ptr().cast(), buf.len()) };
        if nread == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOENT) {
                return Ok(Resolution::NoSuchLink);
            }
            return Err(err)
                .with_context(|| format!("could not read the link name from {}", link.display()));
        }
        let nread = nread as usize;
        if nread <= size {
            buf.truncate(nread);
            return Ok(Resolution::Resolved(PathBuf::from(OsString::from_vec(buf))));
        }
        // The target filled the buffer, so it was truncated.
        if size >= max {
            bail!(
                "could not allocate a buffer big enough to read the link at {}",
                link.display()
            );
        }
        let doubled = if isize::MAX as usize - size >= size {
            size + size
        } else {
            isize::MAX as usize
        };
        size = doubled.min(max);
    }
}
