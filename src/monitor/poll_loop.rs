use anyhow::Result;
use tokio::task;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::config::MonitorConfig;
use super::state::RunState;
use crate::diagnosis::{classify, compute, Category, DiagnosisResult, Expectation, StateDelta};
use crate::snapshot::{SnapshotGroup, SnapshotSource, StateSnapshot};
use crate::stimulus::Stimulus;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Outcome of work handed to the blocking pool under a deadline.
enum Bounded<T> {
    Done(T),
    Expired,
    Cancelled,
    Panicked(String),
}

/// Runs `work` on a blocking thread and waits at most `budget` for it, or
/// until `cancel` fires. An abandoned worker keeps running in the background;
/// helper commands carry their own kill deadline.
async fn bounded<T, F>(work: F, budget: Duration, cancel: &CancellationToken) -> Bounded<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let worker = task::spawn_blocking(work);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Bounded::Cancelled,
        joined = time::timeout(budget, worker) => match joined {
            Ok(Ok(value)) => Bounded::Done(value),
            Ok(Err(err)) => Bounded::Panicked(err.to_string()),
            Err(_) => Bounded::Expired,
        },
    }
}

/// Captures a snapshot off the async thread, handing the source back.
async fn capture<S>(
    mut source: S,
    budget: Duration,
    cancel: &CancellationToken,
) -> Bounded<(S, StateSnapshot)>
where
    S: SnapshotSource + Send + 'static,
{
    bounded(
        move || {
            let snapshot = source.capture();
            (source, snapshot)
        },
        budget,
        cancel,
    )
    .await
}

/// Runs baseline → stimulus → poll → verdict against one snapshot source.
///
/// Every tick is compared with the baseline, not with the previous tick, so
/// the verdict reflects everything that changed since the stimulus.
///
/// Captures and the stimulus run on the blocking pool. Each gets whatever is
/// left of the timeout, but never less than one poll interval, so a run ends
/// within `timeout + poll_interval` even when a helper hangs.
pub struct Monitor {
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn budget(&self, state: &RunState) -> Duration {
        self.config
            .timeout()
            .saturating_sub(state.elapsed())
            .max(self.config.poll_interval())
    }

    pub async fn run<S>(
        &self,
        source: S,
        stimulus: Option<Box<dyn Stimulus>>,
        cancel: &CancellationToken,
    ) -> DiagnosisResult
    where
        S: SnapshotSource + Send + 'static,
    {
        let timeout = self.config.timeout();
        let interval = self.config.poll_interval();
        let mut state = RunState::new();
        let started = Instant::now();

        let (mut source, baseline) = match capture(source, timeout, cancel).await {
            Bounded::Done(pair) => pair,
            Bounded::Cancelled => {
                return Self::finish(&mut state, Category::Cancelled, None, started.elapsed());
            }
            Bounded::Expired => {
                log_warn!("baseline capture did not finish within {}ms", timeout.as_millis());
                return Self::finish(&mut state, all_partial(), None, started.elapsed());
            }
            Bounded::Panicked(reason) => {
                log_warn!("baseline capture failed: {reason}");
                return Self::finish(&mut state, all_partial(), None, started.elapsed());
            }
        };
        state.mark_baseline(started);

        let expectation = match stimulus {
            Some(mut stimulus) => {
                let description = stimulus.describe();
                let expectation = stimulus.expectation();
                let budget = self.budget(&state);
                log_info!("performing stimulus: {description}");

                let reason = match bounded(move || stimulus.perform(), budget, cancel).await {
                    Bounded::Done(Ok(())) => None,
                    Bounded::Done(Err(err)) => Some(format!("{err:#}")),
                    Bounded::Expired => Some(format!(
                        "{description} did not finish within {}ms",
                        budget.as_millis()
                    )),
                    Bounded::Panicked(reason) => Some(reason),
                    Bounded::Cancelled => {
                        let elapsed = state.elapsed();
                        return Self::finish(&mut state, Category::Cancelled, None, elapsed);
                    }
                };
                if let Some(reason) = reason {
                    log_warn!("stimulus failed: {reason}");
                    let elapsed = state.elapsed();
                    return Self::finish(
                        &mut state,
                        Category::StimulusFailed { reason },
                        None,
                        elapsed,
                    );
                }
                expectation
            }
            None => Expectation::any(),
        };

        state.begin_polling();
        let mut last_delta: Option<StateDelta> = None;

        loop {
            let nap = interval.min(timeout.saturating_sub(state.elapsed()));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log_info!("monitoring cancelled after {} ticks", state.ticks());
                    let elapsed = state.elapsed();
                    return Self::finish(&mut state, Category::Cancelled, last_delta, elapsed);
                }
                _ = time::sleep(nap) => {}
            }

            state.record_tick();
            let budget = self.budget(&state);
            let after = match capture(source, budget, cancel).await {
                Bounded::Done((returned, after)) => {
                    source = returned;
                    after
                }
                Bounded::Cancelled => {
                    log_info!("monitoring cancelled during tick {}", state.ticks());
                    let elapsed = state.elapsed();
                    return Self::finish(&mut state, Category::Cancelled, last_delta, elapsed);
                }
                Bounded::Expired => {
                    log_warn!(
                        "capture on tick {} did not finish within {}ms",
                        state.ticks(),
                        budget.as_millis()
                    );
                    let elapsed = state.elapsed();
                    return Self::finish(&mut state, all_partial(), last_delta, elapsed);
                }
                Bounded::Panicked(reason) => {
                    log_warn!("capture on tick {} failed: {reason}", state.ticks());
                    let elapsed = state.elapsed();
                    return Self::finish(&mut state, all_partial(), last_delta, elapsed);
                }
            };

            let delta = compute(&baseline, &after);
            let result = classify(&delta, &expectation, state.elapsed(), timeout);

            log_debug!(
                "tick {}: elapsed={}ms verdict={}",
                state.ticks(),
                result.elapsed.as_millis(),
                result.category.as_str()
            );

            if result.category.is_terminal() {
                log_info!(
                    "verdict {} after {} ticks ({}ms)",
                    result.category.as_str(),
                    state.ticks(),
                    result.elapsed.as_millis()
                );
                state.finish(result.category.clone());
                return result;
            }

            last_delta = Some(delta);
        }
    }

    fn finish(
        state: &mut RunState,
        category: Category,
        evidence: Option<StateDelta>,
        elapsed: Duration,
    ) -> DiagnosisResult {
        state.finish(category.clone());
        DiagnosisResult {
            category,
            evidence,
            elapsed,
        }
    }
}

/// A capture that never came back leaves no group trustworthy.
fn all_partial() -> Category {
    Category::Indeterminate {
        partial_groups: SnapshotGroup::ALL.to_vec(),
    }
}

/// One-call form of `Monitor::run`.
pub async fn run<S>(
    source: S,
    stimulus: Option<Box<dyn Stimulus>>,
    config: MonitorConfig,
    cancel: &CancellationToken,
) -> Result<DiagnosisResult>
where
    S: SnapshotSource + Send + 'static,
{
    let monitor = Monitor::new(config)?;
    Ok(monitor.run(source, stimulus, cancel).await)
}
