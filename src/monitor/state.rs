use serde::Serialize;
use tokio::time::{Duration, Instant};

use crate::diagnosis::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MonitorPhase {
    Idle,
    BaselineCaptured,
    Polling,
    Terminal(Category),
}

impl Default for MonitorPhase {
    fn default() -> Self {
        MonitorPhase::Idle
    }
}

/// Progress of a single monitoring run.
#[derive(Debug, Default)]
pub struct RunState {
    phase: MonitorPhase,
    anchor: Option<Instant>,
    ticks: u32,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &MonitorPhase {
        &self.phase
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, MonitorPhase::Terminal(_))
    }

    /// Time since the baseline capture started; zero before that.
    pub fn elapsed(&self) -> Duration {
        self.anchor
            .map(|anchor| anchor.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// `started` is when the baseline capture began.
    pub fn mark_baseline(&mut self, started: Instant) {
        if self.phase != MonitorPhase::Idle {
            return;
        }
        self.anchor = Some(started);
        self.phase = MonitorPhase::BaselineCaptured;
    }

    pub fn begin_polling(&mut self) {
        if self.phase == MonitorPhase::BaselineCaptured {
            self.phase = MonitorPhase::Polling;
        }
    }

    pub fn record_tick(&mut self) {
        if self.phase == MonitorPhase::Polling {
            self.ticks = self.ticks.saturating_add(1);
        }
    }

    /// Terminal phases are final; a second call keeps the first verdict.
    pub fn finish(&mut self, category: Category) {
        if !self.is_terminal() {
            self.phase = MonitorPhase::Terminal(category);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_through_phases_in_order() {
        let mut state = RunState::new();
        assert_eq!(state.phase(), &MonitorPhase::Idle);
        assert_eq!(state.elapsed(), Duration::ZERO);

        state.begin_polling();
        assert_eq!(state.phase(), &MonitorPhase::Idle);

        state.mark_baseline(Instant::now());
        assert_eq!(state.phase(), &MonitorPhase::BaselineCaptured);

        state.record_tick();
        assert_eq!(state.ticks(), 0);

        state.begin_polling();
        state.record_tick();
        state.record_tick();
        assert_eq!(state.phase(), &MonitorPhase::Polling);
        assert_eq!(state.ticks(), 2);
    }

    #[test]
    fn terminal_phase_is_final() {
        let mut state = RunState::new();
        state.mark_baseline(Instant::now());
        state.begin_polling();

        state.finish(Category::Healthy);
        state.finish(Category::Cancelled);
        assert_eq!(state.phase(), &MonitorPhase::Terminal(Category::Healthy));

        state.record_tick();
        assert_eq!(state.ticks(), 0);
    }
}
