// RepWatch: Repetition State Machine & Cycle Tracker
//
//   Idle -> AtTop -> Descending -> AtBottom -> Ascending -> AtTop (repetition done)
//
// Every transition out of AtTop and onwards needs `confirm_threshold`
// consecutive windows showing the next phase. Verdicts are buffered while a
// repetition is in progress and folded into one result when it completes.
// Times are milliseconds since boot and may wrap.

use heapless::{Deque, Vec};

use crate::aggregator::{aggregate, Aggregation, AggregationPolicy};
use crate::config::*;
use crate::error::ConfigError;
use crate::events::{
    ClassifierVerdict, Completion, PhaseLabel, RepetitionCounters, RepetitionResult,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepetitionConfig {
    pub confirm_threshold: u8,
    pub state_timeout_ms: u32,
    pub cycle_timeout_ms: u32,
    pub policy: AggregationPolicy,
    /// Verdicts below this confidence are not buffered.
    pub min_verdict_confidence: f32,
}

impl RepetitionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirm_threshold < 2 {
            return Err(ConfigError::ConfirmThresholdTooLow(self.confirm_threshold));
        }
        if self.cycle_timeout_ms < self.state_timeout_ms {
            return Err(ConfigError::TimeoutOrder {
                state_ms: self.state_timeout_ms,
                cycle_ms: self.cycle_timeout_ms,
            });
        }
        Ok(())
    }
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: CONFIRM_THRESHOLD,
            state_timeout_ms: STATE_TIMEOUT_MS,
            cycle_timeout_ms: CYCLE_TIMEOUT_MS,
            policy: AggregationPolicy::default(),
            min_verdict_confidence: MIN_VERDICT_CONFIDENCE,
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle tracker
// ---------------------------------------------------------------------------

/// Bounded FIFO of the verdicts seen during one repetition.
/// When full, the oldest verdict is evicted to make room.
#[derive(Debug, Clone, Default)]
pub struct CycleTracker<const N: usize = CYCLE_TRACKER_CAPACITY> {
    verdicts: Deque<ClassifierVerdict, N>,
}

impl<const N: usize> CycleTracker<N> {
    pub const fn new() -> Self {
        Self {
            verdicts: Deque::new(),
        }
    }

    /// Returns the evicted verdict, if the tracker was full.
    pub fn push(&mut self, verdict: ClassifierVerdict) -> Option<ClassifierVerdict> {
        let evicted = if self.verdicts.is_full() {
            self.verdicts.pop_front()
        } else {
            None
        };
        // Cannot fail: there is room after the eviction above.
        let _ = self.verdicts.push_back(verdict);
        evicted
    }

    pub fn clear(&mut self) {
        self.verdicts.clear();
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifierVerdict> + '_ {
        self.verdicts.iter()
    }

    /// Read and clear, oldest verdict first.
    pub fn take(&mut self) -> Vec<ClassifierVerdict, N> {
        let mut out = Vec::new();
        while let Some(verdict) = self.verdicts.pop_front() {
            // Same capacity as the deque.
            let _ = out.push(verdict);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepState {
    Idle,
    AtTop,
    Descending,
    AtBottom,
    Ascending,
}

impl RepState {
    /// A repetition is underway; verdicts are buffered and timeouts apply.
    pub fn in_progress(self) -> bool {
        matches!(self, Self::Descending | Self::AtBottom | Self::Ascending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    StateTimeout,
    CycleTimeout,
}

/// Something the presentation layer should hear about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepEvent {
    Completed(RepetitionResult),
    Abandoned { state: RepState, reason: AbandonReason },
}

#[derive(Debug, Clone)]
pub struct RepetitionStateMachine<const N: usize = CYCLE_TRACKER_CAPACITY> {
    config: RepetitionConfig,
    state: RepState,
    confirm_count: u8,
    state_entered_ms: u32,
    cycle_started_ms: u32,
    tracker: CycleTracker<N>,
    counters: RepetitionCounters,
}

impl<const N: usize> RepetitionStateMachine<N> {
    pub fn new(config: RepetitionConfig) -> Self {
        Self {
            config,
            state: RepState::Idle,
            confirm_count: 0,
            state_entered_ms: 0,
            cycle_started_ms: 0,
            tracker: CycleTracker::new(),
            counters: RepetitionCounters::default(),
        }
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn counters(&self) -> &RepetitionCounters {
        &self.counters
    }

    pub fn tracker(&self) -> &CycleTracker<N> {
        &self.tracker
    }

    pub fn config(&self) -> &RepetitionConfig {
        &self.config
    }

    /// Drop any in-flight repetition and return to Idle. Counters are kept.
    pub fn reset(&mut self) {
        self.state = RepState::Idle;
        self.confirm_count = 0;
        self.tracker.clear();
    }

    pub fn reset_counters(&mut self) {
        self.counters = RepetitionCounters::default();
    }

    /// Feed one evaluated window. `verdict` is `None` when the classifier
    /// produced nothing for this window.
    pub fn update(
        &mut self,
        phase: PhaseLabel,
        verdict: Option<ClassifierVerdict>,
        now_ms: u32,
    ) -> Option<RepEvent> {
        if let Some(event) = self.check_timeouts(now_ms) {
            return Some(event);
        }

        // The verdict belongs to the state the window was evaluated in. The
        // window that confirms Descending is not buffered; the one that
        // completes the cycle is, before aggregation.
        if self.state.in_progress() {
            if let Some(verdict) = verdict {
                self.buffer(verdict);
            }
        }

        self.advance(phase, now_ms)
    }

    fn buffer(&mut self, verdict: ClassifierVerdict) {
        if verdict.confidence < self.config.min_verdict_confidence {
            return;
        }
        if let Some(old) = self.tracker.push(verdict) {
            log::debug!("cycle tracker full, dropped {:?}", old);
        }
    }

    fn advance(&mut self, phase: PhaseLabel, now_ms: u32) -> Option<RepEvent> {
        let (target, next) = match self.state {
            RepState::Idle => {
                if phase == PhaseLabel::AtTop {
                    self.enter(RepState::AtTop, now_ms);
                }
                return None;
            }
            RepState::AtTop => (PhaseLabel::Moving, RepState::Descending),
            RepState::Descending => (PhaseLabel::AtBottom, RepState::AtBottom),
            RepState::AtBottom => (PhaseLabel::Moving, RepState::Ascending),
            RepState::Ascending => (PhaseLabel::AtTop, RepState::AtTop),
        };

        if phase != target {
            self.confirm_count = 0;
            return None;
        }
        self.confirm_count = self.confirm_count.saturating_add(1);
        if self.confirm_count < self.config.confirm_threshold {
            return None;
        }

        let completing = self.state == RepState::Ascending;
        if self.state == RepState::AtTop {
            self.tracker.clear();
            self.cycle_started_ms = now_ms;
        }
        self.enter(next, now_ms);

        if completing {
            let result = self.finish(Completion::Normal);
            return Some(RepEvent::Completed(result));
        }
        None
    }

    fn check_timeouts(&mut self, now_ms: u32) -> Option<RepEvent> {
        if !self.state.in_progress() {
            return None;
        }

        let in_state = now_ms.wrapping_sub(self.state_entered_ms);
        let in_cycle = now_ms.wrapping_sub(self.cycle_started_ms);
        let state_expired = in_state > self.config.state_timeout_ms;

        if state_expired
            && self.state == RepState::Ascending
            && self.tracker.len() >= MIN_AGGREGATE_VERDICTS
        {
            log::warn!("ascent timed out after {} ms, forcing completion", in_state);
            let result = self.finish(Completion::Forced);
            self.enter(RepState::Idle, now_ms);
            return Some(RepEvent::Completed(result));
        }

        let reason = if state_expired {
            AbandonReason::StateTimeout
        } else if in_cycle > self.config.cycle_timeout_ms {
            AbandonReason::CycleTimeout
        } else {
            return None;
        };

        let state = self.state;
        log::warn!(
            "abandoning repetition in {:?} ({:?}, {} verdicts discarded)",
            state,
            reason,
            self.tracker.len()
        );
        self.tracker.clear();
        self.enter(RepState::Idle, now_ms);
        Some(RepEvent::Abandoned { state, reason })
    }

    fn enter(&mut self, state: RepState, now_ms: u32) {
        log::debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
        self.state_entered_ms = now_ms;
        self.confirm_count = 0;
    }

    /// Aggregate the tracker into a result, count it and clear the tracker.
    fn finish(&mut self, completion: Completion) -> RepetitionResult {
        let verdicts = self.tracker.take();

        let result = match aggregate(self.config.policy, &verdicts) {
            Aggregation::Decided {
                class,
                confidence,
                verdicts,
            } => RepetitionResult {
                class: Some(class),
                confidence,
                verdicts,
                provisional: false,
                completion,
            },
            Aggregation::InsufficientSamples { available } => RepetitionResult {
                class: verdicts.last().map(|v| v.class),
                confidence: verdicts.last().map_or(0.0, |v| v.confidence),
                verdicts: available,
                provisional: true,
                completion,
            },
        };

        self.counters.record(&result);
        log::debug!(
            "repetition #{}: {:?} ({:.0}%, {} verdicts, {:?})",
            self.counters.total,
            result.class.map(|c| c.label()),
            result.confidence * 100.0,
            result.verdicts,
            completion
        );
        result
    }
}

impl<const N: usize> Default for RepetitionStateMachine<N> {
    fn default() -> Self {
        Self::new(RepetitionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PostureClass;
    use PhaseLabel::*;

    const STEP_MS: u32 = 250;

    fn good(confidence: f32) -> Option<ClassifierVerdict> {
        Some(ClassifierVerdict::new(PostureClass::GoodForm, confidence))
    }

    /// Feeds phases one window apart, starting at `start_ms`.
    fn drive<const N: usize>(
        machine: &mut RepetitionStateMachine<N>,
        phases: &[PhaseLabel],
        start_ms: u32,
    ) -> std::vec::Vec<RepEvent> {
        phases
            .iter()
            .enumerate()
            .filter_map(|(i, phase)| {
                machine.update(*phase, good(0.9), start_ms.wrapping_add(i as u32 * STEP_MS))
            })
            .collect()
    }

    const ONE_REP: [PhaseLabel; 9] = [
        AtTop, Moving, Moving, AtBottom, AtBottom, Moving, Moving, AtTop, AtTop,
    ];

    #[test]
    fn canonical_sequence_completes_one_repetition() {
        let mut machine = RepetitionStateMachine::<12>::default();
        let mut states = std::vec::Vec::new();
        let mut events = std::vec::Vec::new();
        for (i, phase) in ONE_REP.iter().enumerate() {
            if let Some(event) = machine.update(*phase, good(0.9), i as u32 * STEP_MS) {
                events.push(event);
            }
            if states.last() != Some(&machine.state()) {
                states.push(machine.state());
            }
        }

        assert_eq!(
            states,
            vec![
                RepState::AtTop,
                RepState::Descending,
                RepState::AtBottom,
                RepState::Ascending,
                RepState::AtTop
            ]
        );
        assert_eq!(events.len(), 1);
        match events[0] {
            RepEvent::Completed(result) => {
                assert_eq!(result.class, Some(PostureClass::GoodForm));
                assert_eq!(result.completion, Completion::Normal);
                assert!(!result.provisional);
                // Windows 3..=8 were evaluated while a repetition was in progress.
                assert_eq!(result.verdicts, 6);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(machine.counters().total, 1);
        assert!(machine.tracker().is_empty());
    }

    #[test]
    fn window_that_starts_the_descent_is_not_buffered() {
        let mut machine = RepetitionStateMachine::<12>::default();
        drive(&mut machine, &[AtTop, Moving, Moving], 0);
        assert_eq!(machine.state(), RepState::Descending);
        assert!(machine.tracker().is_empty());

        machine.update(Moving, good(0.9), 3 * STEP_MS);
        assert_eq!(machine.tracker().len(), 1);
    }

    #[test]
    fn completing_window_is_aggregated() {
        let mut machine = RepetitionStateMachine::<12>::default();
        let last = ONE_REP.len() - 1;
        let mut completed = None;
        for (i, phase) in ONE_REP.iter().enumerate() {
            let verdict = if i == last {
                Some(ClassifierVerdict::new(PostureClass::PartialRom, 1.0))
            } else {
                None
            };
            completed = machine.update(*phase, verdict, i as u32 * STEP_MS).or(completed);
        }
        match completed {
            Some(RepEvent::Completed(result)) => {
                assert_eq!(result.class, Some(PostureClass::PartialRom));
                assert_eq!(result.verdicts, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn back_to_back_repetitions_are_counted() {
        let mut machine = RepetitionStateMachine::<12>::default();
        drive(&mut machine, &ONE_REP, 0);
        let second = [Moving, Moving, AtBottom, AtBottom, Moving, Moving, AtTop, AtTop];
        let events = drive(&mut machine, &second, 10 * STEP_MS);
        assert_eq!(events.len(), 1);
        assert_eq!(machine.counters().total, 2);
        assert_eq!(machine.counters().count(PostureClass::GoodForm), 2);
    }

    #[test]
    fn single_flicker_does_not_transition() {
        let mut machine = RepetitionStateMachine::<12>::default();
        drive(&mut machine, &[AtTop, Moving, AtTop, Moving, AtTop], 0);
        assert_eq!(machine.state(), RepState::AtTop);
        assert!(machine.tracker().is_empty());
    }

    #[test]
    fn descent_without_bottom_is_abandoned() {
        let mut machine = RepetitionStateMachine::<12>::default();
        let mut phases = vec![AtTop, Moving, Moving];
        // Never two AtBottom windows in a row.
        for _ in 0..30 {
            phases.push(AtBottom);
            phases.push(Moving);
        }
        let events = drive(&mut machine, &phases, 0);
        assert!(events
            .iter()
            .all(|e| matches!(e, RepEvent::Abandoned { state: RepState::Descending, .. })));
        assert!(!events.is_empty());
        assert_eq!(machine.counters().total, 0);
    }

    #[test]
    fn cycle_timeout_abandons_slow_repetition() {
        let config = RepetitionConfig {
            state_timeout_ms: 3_000,
            cycle_timeout_ms: 5_000,
            ..RepetitionConfig::default()
        };
        let mut machine = RepetitionStateMachine::<12>::new(config);
        // Descend at t=500, reach the bottom at t=3000; the cycle expires after t=5500.
        let mut t = 0;
        let mut feed = |machine: &mut RepetitionStateMachine<12>, phase, n: usize| {
            let mut events = std::vec::Vec::new();
            for _ in 0..n {
                events.extend(machine.update(phase, good(0.8), t));
                t += STEP_MS;
            }
            events
        };
        feed(&mut machine, AtTop, 1);
        feed(&mut machine, Moving, 2);
        feed(&mut machine, Moving, 8);
        assert_eq!(machine.state(), RepState::Descending);
        feed(&mut machine, AtBottom, 2);
        assert_eq!(machine.state(), RepState::AtBottom);
        let events = feed(&mut machine, AtBottom, 11);
        assert_eq!(
            events,
            vec![RepEvent::Abandoned {
                state: RepState::AtBottom,
                reason: AbandonReason::CycleTimeout
            }]
        );
        assert_eq!(machine.state(), RepState::Idle);
        assert!(machine.tracker().is_empty());
        assert_eq!(machine.counters().total, 0);
    }

    #[test]
    fn stalled_ascent_is_force_completed() {
        let mut machine = RepetitionStateMachine::<12>::default();
        drive(&mut machine, &ONE_REP[..7], 0);
        assert_eq!(machine.state(), RepState::Ascending);

        let entered = 6 * STEP_MS;
        let event = machine.update(Moving, good(0.9), entered + STATE_TIMEOUT_MS + 1);
        match event {
            Some(RepEvent::Completed(result)) => {
                assert_eq!(result.completion, Completion::Forced);
                assert_eq!(result.class, Some(PostureClass::GoodForm));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(machine.counters().total, 1);
        assert_eq!(machine.state(), RepState::Idle);
    }

    #[test]
    fn stalled_ascent_without_evidence_is_abandoned() {
        let mut machine = RepetitionStateMachine::<12>::default();
        for (i, phase) in ONE_REP[..7].iter().enumerate() {
            machine.update(*phase, None, i as u32 * STEP_MS);
        }
        assert_eq!(machine.state(), RepState::Ascending);
        let event = machine.update(Moving, None, 6 * STEP_MS + STATE_TIMEOUT_MS + 1);
        assert_eq!(
            event,
            Some(RepEvent::Abandoned {
                state: RepState::Ascending,
                reason: AbandonReason::StateTimeout
            })
        );
        assert_eq!(machine.counters().total, 0);
    }

    #[test]
    fn completion_with_single_verdict_is_provisional() {
        let mut machine = RepetitionStateMachine::<12>::default();
        let mut last = None;
        for (i, phase) in ONE_REP.iter().enumerate() {
            let verdict = if i == 4 {
                Some(ClassifierVerdict::new(PostureClass::HipsSagging, 0.7))
            } else {
                None
            };
            last = machine.update(*phase, verdict, i as u32 * STEP_MS).or(last);
        }
        match last {
            Some(RepEvent::Completed(result)) => {
                assert!(result.provisional);
                assert_eq!(result.class, Some(PostureClass::HipsSagging));
                assert_eq!(result.verdicts, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn completion_without_verdicts_counts_unclassified() {
        let mut machine = RepetitionStateMachine::<12>::default();
        for (i, phase) in ONE_REP.iter().enumerate() {
            machine.update(*phase, None, i as u32 * STEP_MS);
        }
        assert_eq!(machine.counters().total, 1);
        assert_eq!(machine.counters().unclassified, 1);
    }

    #[test]
    fn low_confidence_verdicts_are_not_buffered() {
        let config = RepetitionConfig {
            min_verdict_confidence: 0.5,
            ..RepetitionConfig::default()
        };
        let mut machine = RepetitionStateMachine::<12>::new(config);
        for (i, phase) in ONE_REP[..4].iter().enumerate() {
            machine.update(*phase, good(0.3), i as u32 * STEP_MS);
        }
        assert_eq!(machine.state(), RepState::Descending);
        assert!(machine.tracker().is_empty());
    }

    #[test]
    fn reset_drops_in_flight_cycle() {
        let mut machine = RepetitionStateMachine::<12>::default();
        drive(&mut machine, &ONE_REP[..5], 0);
        assert_eq!(machine.state(), RepState::AtBottom);
        machine.reset();
        assert_eq!(machine.state(), RepState::Idle);
        assert!(machine.tracker().is_empty());
        assert_eq!(machine.counters().total, 0);
    }

    #[test]
    fn timeouts_survive_clock_wrap() {
        let mut machine = RepetitionStateMachine::<12>::default();
        let start = u32::MAX - 1_000;
        drive(&mut machine, &ONE_REP, start);
        assert_eq!(machine.counters().total, 1);
    }

    #[test]
    fn tracker_overflow_keeps_most_recent() {
        let mut tracker = CycleTracker::<3>::new();
        let classes = [
            PostureClass::GoodForm,
            PostureClass::HipsHigh,
            PostureClass::HipsSagging,
            PostureClass::PartialRom,
        ];
        let mut evicted = None;
        for class in classes {
            evicted = tracker.push(ClassifierVerdict::new(class, 0.5)).or(evicted);
        }
        assert_eq!(evicted.map(|v| v.class), Some(PostureClass::GoodForm));
        let kept: std::vec::Vec<_> = tracker.iter().map(|v| v.class).collect();
        assert_eq!(kept, classes[1..].to_vec());

        let taken = tracker.take();
        assert_eq!(taken.len(), 3);
        assert_eq!(taken[0].class, PostureClass::HipsHigh);
        assert!(tracker.is_empty());
    }

    #[test]
    fn config_validation() {
        assert!(RepetitionConfig::default().validate().is_ok());
        let low = RepetitionConfig {
            confirm_threshold: 1,
            ..RepetitionConfig::default()
        };
        assert_eq!(low.validate(), Err(ConfigError::ConfirmThresholdTooLow(1)));
        let inverted = RepetitionConfig {
            state_timeout_ms: 5_000,
            cycle_timeout_ms: 1_000,
            ..RepetitionConfig::default()
        };
        assert!(matches!(inverted.validate(), Err(ConfigError::TimeoutOrder { .. })));
    }
}
