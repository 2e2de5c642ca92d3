use std::time::Duration;

use log::{debug, info};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    session::{RunId, RunStatus, TickReport, TrainingSession},
};

/// How a driven run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run: RunId,
    pub ticks: usize,
    /// `None` if the run was replaced while being driven.
    pub status: Option<RunStatus>,
    pub last: Option<TickReport>,
}

/// Paces a run, one solver step per period, the way a display refresh would.
#[derive(Debug, Clone, Copy)]
pub struct TickDriver {
    period: Duration,
}

impl TickDriver {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Drives `run` until the session stops producing reports or `token` is cancelled.
    ///
    /// Cancellation is only observed between ticks, and it cancels the run in the session.
    ///
    /// # Arguments
    /// * `session` - The session owning the run.
    /// * `run` - The run to drive.
    /// * `token` - Stops the run when cancelled.
    /// * `on_tick` - Called with every report, in order.
    ///
    /// # Errors
    /// Whatever error `TrainingSession::tick` returns.
    pub async fn run<F>(
        &self,
        session: &mut TrainingSession,
        run: RunId,
        token: &CancellationToken,
        mut on_tick: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&TickReport),
    {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks = 0;
        let mut last = None;

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    session.cancel(run);
                    info!("run {run} stopped after {ticks} ticks");
                    break;
                }

                _ = interval.tick() => {
                    let Some(report) = session.tick(run)? else {
                        debug!("run {run} has no more ticks");
                        break;
                    };

                    ticks += 1;
                    on_tick(&report);
                    last = Some(report);
                }
            }
        }

        Ok(RunSummary {
            run,
            ticks,
            status: session.status(run),
            last,
        })
    }
}
