//! Signal-mask management around the fork point
//!
//! Signals delivered between a fork call and the point where the child has
//! finished setting up can be lost or misrouted. Blocking a fixed set across
//! the fork and restoring the prior mask afterwards avoids that race.

use anyhow::{Context, Result};
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};

/// Signals blocked while a fork is in flight.
const BLOCKED_SIGNALS: [Signal; 6] = [
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGPIPE,
    Signal::SIGALRM,
    Signal::SIGTERM,
];

/// A snapshot of the signal mask that was active before [`SignalGuard::block`].
///
/// The guard does not restore the mask implicitly; the caller restores it
/// explicitly in whichever process (parent or continuing child) should resume
/// normal signal delivery.
pub struct SignalGuard {
    saved: SigSet,
}

impl SignalGuard {
    /// Block the fixed signal set, capturing the previously active mask.
    pub fn block() -> Result<Self> {
        let mut set = SigSet::empty();
        for signal in BLOCKED_SIGNALS {
            set.add(signal);
        }
        let mut saved = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut saved))
            .context("could not block signals")?;
        Ok(Self { saved })
    }

    /// Reinstall the mask that was active when the guard was created.
    ///
    /// Safe to call from both sides of a fork; each process carries its own
    /// copy of the snapshot.
    pub fn restore(&self) -> Result<()> {
        pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.saved), None)
            .context("could not restore the signal mask")
    }
}
