//! Purpose: Drive a status probe until a server-side job reports a terminal state.
//! Exports: `StatusProbe`, `PollOptions`, `CancelToken`, `poll_until_done`, `DEFAULT_POLL_INTERVAL`.
//! Role: Single retry engine shared by every job kind.
//! Invariants: The first probe runs immediately; the interval timer is armed only after a "not done".
//! Invariants: At most one probe is in flight per call; ticks that land during a probe are skipped.
//! Invariants: A probe failure ends the wait with that error; there is no internal retry or deadline.
use super::error::{Error, ErrorKind};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// One "has this job finished?" check against the cluster.
pub trait StatusProbe {
    fn check(&self) -> impl Future<Output = Result<bool, Error>> + Send;
}

impl<F, Fut> StatusProbe for F
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool, Error>> + Send,
{
    fn check(&self) -> impl Future<Output = Result<bool, Error>> + Send {
        self()
    }
}

/// Opt-in cancellation for a wait. Cloning shares the same signal.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct PollOptions {
    interval: Duration,
    cancel: Option<CancelToken>,
}

impl PollOptions {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            cancel: None,
        }
    }

    /// Zero means "use the default", mirroring an unset interval.
    pub fn from_interval_ms(interval_ms: u64) -> Self {
        Self::new().with_interval(Duration::from_millis(interval_ms))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new()
    }
}

struct PollState {
    interval: Duration,
    timer: Option<Interval>,
    checks: u64,
}

impl PollState {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
            checks: 0,
        }
    }

    async fn next_tick(&mut self) {
        let interval = self.interval;
        let timer = self.timer.get_or_insert_with(|| {
            let mut timer = time::interval_at(Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer
        });
        timer.tick().await;
    }
}

pub async fn poll_until_done<P>(probe: &P, options: &PollOptions) -> Result<(), Error>
where
    P: StatusProbe + ?Sized,
{
    let mut state = PollState::new(options.interval);
    let cancel = options.cancel.as_ref();
    debug!(interval_ms = state.interval.as_millis() as u64, "polling job status");

    loop {
        state.checks += 1;
        trace!(check = state.checks, "probing job status");
        if guarded(cancel, probe.check()).await? {
            debug!(checks = state.checks, "job reached terminal state");
            return Ok(());
        }
        guarded(cancel, async {
            state.next_tick().await;
            Ok(())
        })
        .await?;
    }
}

async fn guarded<T>(
    cancel: Option<&CancelToken>,
    work: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    let Some(token) = cancel else {
        return work.await;
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("job status polling cancelled");
            Err(Error::new(ErrorKind::Cancelled).with_message("job status polling was cancelled"))
        }
        result = work => result,
    }
}
