//! Idle watchdog: terminates a stream that has gone quiet for too long.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::reader::StreamTerminator;

/// Timer re-armed on every observed event.
///
/// Fires `timeout` after the last [`touch`](Self::touch) (or after arming),
/// calls [`StreamTerminator::terminate`] once and records that it fired.
/// Dropping the watchdog disarms it.
pub struct IdleWatchdog {
    activity: watch::Sender<Instant>,
    disarm: CancellationToken,
    fired: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl IdleWatchdog {
    pub fn arm(timeout: Duration, terminator: StreamTerminator) -> Self {
        let (activity, mut last_seen) = watch::channel(Instant::now());
        let disarm = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));

        let task = {
            let disarm = disarm.clone();
            let fired = fired.clone();
            tokio::spawn(async move {
                loop {
                    let deadline = *last_seen.borrow_and_update() + timeout;
                    tokio::select! {
                        biased;

                        _ = disarm.cancelled() => return,

                        changed = last_seen.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }

                        _ = tokio::time::sleep_until(deadline) => {
                            if terminator.terminate() {
                                warn!(timeout_secs = timeout.as_secs(), "no agent activity, terminating");
                                fired.store(true, Ordering::SeqCst);
                            }
                            return;
                        }
                    }
                }
            })
        };

        Self {
            activity,
            disarm,
            fired,
            task,
        }
    }

    /// Record activity, pushing the deadline out by a full timeout.
    pub fn touch(&self) {
        let _ = self.activity.send(Instant::now());
    }

    /// Stop the timer for good. Safe to call more than once.
    pub fn disarm(&self) {
        self.disarm.cancel();
    }

    /// True if the watchdog terminated the stream.
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for IdleWatchdog {
    fn drop(&mut self) {
        self.disarm.cancel();
    }
}
