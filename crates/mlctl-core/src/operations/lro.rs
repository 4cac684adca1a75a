//! Polling of long-running remote operations.
//!
//! The service answers create and delete calls before the work is done; the
//! caller then queries the resource until it reaches a terminal state. A
//! [`CancellationToken`] lets an interactive caller stop waiting without
//! touching the remote operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::error::Error;

/// How often a sleeping poller wakes up to look at its token.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Shared flag flipped by a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Outcome of one status query.
#[derive(Debug)]
pub enum PollStatus<T> {
    Pending,
    Done(T),
}

#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    cancellation: CancellationToken,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, CancellationToken::new())
    }
}

impl Poller {
    pub fn new(interval: Duration, cancellation: CancellationToken) -> Self {
        Self {
            interval,
            cancellation,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Calls `check` until it reports [`PollStatus::Done`] or fails.
    ///
    /// `operation` names what is being waited for in the
    /// [`Error::Interrupted`] message.
    pub fn poll<T>(
        &self,
        operation: &str,
        mut check: impl FnMut() -> Result<PollStatus<T>, Error>,
    ) -> Result<T, Error> {
        loop {
            self.ensure_not_cancelled(operation)?;
            if let PollStatus::Done(value) = check()? {
                return Ok(value);
            }
            log::debug!("{operation} still in progress, next check in {:?}", self.interval);
            self.sleep(operation)?;
        }
    }

    fn ensure_not_cancelled(&self, operation: &str) -> Result<(), Error> {
        if self.cancellation.is_cancelled() {
            Err(Error::Interrupted {
                operation: operation.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn sleep(&self, operation: &str) -> Result<(), Error> {
        let deadline = Instant::now() + self.interval;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(CANCEL_CHECK_INTERVAL.min(deadline - now));
            self.ensure_not_cancelled(operation)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poller() -> Poller {
        Poller::new(Duration::ZERO, CancellationToken::new())
    }

    #[test]
    fn polls_until_done() {
        let mut calls = 0;
        let value = poller()
            .poll("job j1", || {
                calls += 1;
                Ok(if calls == 3 {
                    PollStatus::Done("Completed")
                } else {
                    PollStatus::Pending
                })
            })
            .unwrap();

        assert_eq!(value, "Completed");
        assert_eq!(calls, 3);
    }

    #[test]
    fn check_errors_stop_the_loop() {
        let err = poller()
            .poll::<()>("workspace ws", || {
                Err(Error::RemoteOperation {
                    status: "Failed".into(),
                    message: "quota exceeded".into(),
                })
            })
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn cancelled_token_interrupts_without_checking() {
        let token = CancellationToken::new();
        token.cancel();
        let poller = Poller::new(Duration::from_secs(60), token);

        let err = poller
            .poll::<()>("job j1", || panic!("must not be called"))
            .unwrap_err();
        assert!(matches!(err, Error::Interrupted { operation } if operation == "job j1"));
    }

    #[test]
    fn cancellation_wakes_a_sleeping_poller() {
        let token = CancellationToken::new();
        let poller = Poller::new(Duration::from_secs(60), token.clone());
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let started = Instant::now();
        let err = poller
            .poll::<()>("job j1", || Ok(PollStatus::Pending))
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, Error::Interrupted { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
