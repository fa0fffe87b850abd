// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Inactivity monitor.
//!
//! A single-shot timer on a dedicated thread. [`InactivityMonitor::arm`]
//! (re)starts the countdown, [`InactivityMonitor::disarm`] cancels it. When
//! the countdown elapses the callback runs once on the monitor thread and
//! the monitor stays disarmed until armed again.
//!
//! Every arm and disarm bumps an epoch counter. The callback receives an
//! [`Expiry`] carrying the epoch it was armed with; if the monitor has been
//! armed or disarmed since, [`Expiry::is_current`] returns `false`. Callers
//! that mutate shared state check it while holding the same lock the command
//! path holds when calling `arm`/`disarm`, which rules out a stale expiry
//! acting after a newer command.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

enum Signal {
    Arm { epoch: u64, deadline: Instant },
    Disarm,
    Shutdown,
}

/// Handed to the expiry callback.
#[derive(Debug, Clone)]
pub struct Expiry {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl Expiry {
    /// `true` while no arm or disarm happened after the one that expired.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }
}

/// Deferred callback with cancel-and-reschedule semantics.
pub struct InactivityMonitor {
    timeout: Duration,
    epoch: Arc<AtomicU64>,
    signals: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
}

impl InactivityMonitor {
    /// Starts the monitor thread, initially disarmed.
    pub fn spawn<F>(timeout: Duration, on_expire: F) -> io::Result<Self>
    where
        F: Fn(Expiry) + Send + 'static,
    {
        let (signals, receiver) = channel::unbounded();
        let epoch = Arc::new(AtomicU64::new(0));

        let worker = thread::Builder::new()
            .name("inactivity-monitor".into())
            .spawn({
                let epoch = Arc::clone(&epoch);
                move || run(receiver, epoch, on_expire)
            })?;

        Ok(Self {
            timeout,
            epoch,
            signals,
            worker: Some(worker),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts the countdown, replacing any pending one.
    pub fn arm(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let deadline = Instant::now() + self.timeout;
        // The worker only stops on drop, so sending cannot fail before then.
        let _ = self.signals.send(Signal::Arm { epoch, deadline });
    }

    /// Cancels the pending countdown, if any.
    pub fn disarm(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _ = self.signals.send(Signal::Disarm);
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        let _ = self.signals.send(Signal::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run<F: Fn(Expiry)>(receiver: Receiver<Signal>, current: Arc<AtomicU64>, on_expire: F) {
    let mut pending: Option<(u64, Instant)> = None;

    loop {
        let signal = match pending {
            Some((_, deadline)) => receiver.recv_deadline(deadline),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match signal {
            Ok(Signal::Arm { epoch, deadline }) => pending = Some((epoch, deadline)),
            Ok(Signal::Disarm) => pending = None,
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Some((epoch, _)) = pending.take() {
                    debug!(epoch, "inactivity timeout elapsed");
                    on_expire(Expiry {
                        epoch,
                        current: Arc::clone(&current),
                    });
                }
            }
        }
    }
}
