// RepWatch: Pipeline Context
//
// One owned struct holds every piece of mutable pipeline state: filter
// states, the sample window, the repetition state machine and its counters.
// It is driven from a single control flow:
//
//   every sample period   -> push_sample()
//   every inference tick  -> poll() -> classifier + phase detector -> state machine
//
// Nothing here blocks, allocates or fails.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::conditioner::SignalConditioner;
use crate::config::*;
use crate::ei::Classifier;
use crate::error::ConfigError;
use crate::events::{
    ClassifierVerdict, PhaseLabel, ProcessedSample, RawSample, RepetitionCounters,
    RepetitionResult,
};
use crate::filters::FilterCoefficients;
use crate::phase::{detect_phase, PhaseThresholds, WindowStats};
use crate::repetition::{
    AbandonReason, RepEvent, RepState, RepetitionConfig, RepetitionStateMachine,
};
use crate::window::{NormalizedWindow, Normalization, SlidingWindow};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything the pipeline needs at start-up. Never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub filters: FilterCoefficients,
    pub normalization: Normalization,
    pub phase: PhaseThresholds,
    pub repetition: RepetitionConfig,
    pub inference_interval_ms: u32,
}

impl EngineConfig {
    /// Offline validation of the deployment constants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if WINDOW_SIZE == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if CYCLE_TRACKER_CAPACITY == 0 {
            return Err(ConfigError::EmptyCycleTracker);
        }
        if self.inference_interval_ms == 0 {
            return Err(ConfigError::ZeroInferenceInterval);
        }
        self.filters.validate()?;
        self.normalization.validate()?;
        self.phase.validate()?;
        self.repetition.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filters: FilterCoefficients::default(),
            normalization: Normalization::default(),
            phase: PhaseThresholds::default(),
            repetition: RepetitionConfig::default(),
            inference_interval_ms: INFERENCE_INTERVAL_MS,
        }
    }
}

// ---------------------------------------------------------------------------
// Inference on/off flag
// ---------------------------------------------------------------------------

/// Set from an interrupt or another task; read only by the sampling loop.
#[derive(Debug, Default)]
pub struct InferenceSwitch(AtomicBool);

impl InferenceSwitch {
    pub const fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }

    /// Returns the new state.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Serial console input: one toggle per keystroke. Line endings are not
    /// keystrokes, so typing a key and Enter toggles once. Returns the new
    /// state if anything toggled.
    pub fn toggle_on_keys(&self, bytes: &[u8]) -> Option<bool> {
        let mut state = None;
        for &key in bytes.iter().filter(|&&b| b != b'\r' && b != b'\n') {
            log::debug!("key pressed: {:?} (0x{:02X})", key as char, key);
            state = Some(self.toggle());
        }
        state
    }
}

// ---------------------------------------------------------------------------
// Presentation sink
// ---------------------------------------------------------------------------

/// Receives repetition results. Fire-and-forget: must not block.
pub trait RepetitionSink {
    fn repetition(&mut self, result: &RepetitionResult, counters: &RepetitionCounters);

    fn abandoned(&mut self, _state: RepState, _reason: AbandonReason) {}
}

/// Writes results to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl RepetitionSink for LogSink {
    fn repetition(&mut self, result: &RepetitionResult, counters: &RepetitionCounters) {
        let label = result.class.map_or("unclassified", |c| c.label());
        let flag = if result.provisional { " (low confidence)" } else { "" };
        log::info!(
            "Rep {}: {} {:.0}%{} | good {} / hips-high {} / sagging {} / partial {}",
            counters.total,
            label,
            result.confidence * 100.0,
            flag,
            counters.per_class[0],
            counters.per_class[1],
            counters.per_class[2],
            counters.per_class[3],
        );
    }

    fn abandoned(&mut self, state: RepState, reason: AbandonReason) {
        log::info!("Repetition abandoned in {:?} ({:?})", state, reason);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Fewer than `WINDOW_SIZE` samples since the last reset.
    WindowNotFull { samples: usize },
    Evaluated {
        stats: WindowStats,
        phase: PhaseLabel,
        /// `None` if the classifier produced nothing for this window.
        verdict: Option<ClassifierVerdict>,
        event: Option<RepEvent>,
    },
}

impl TickOutcome {
    pub fn event(&self) -> Option<&RepEvent> {
        match self {
            Self::Evaluated { event, .. } => event.as_ref(),
            Self::WindowNotFull { .. } => None,
        }
    }
}

pub struct RepEngine {
    config: EngineConfig,
    conditioner: SignalConditioner,
    window: SlidingWindow,
    machine: RepetitionStateMachine,
    /// Classifier input, reused every tick.
    scratch: NormalizedWindow,
    last_inference_ms: Option<u32>,
    inference_active: bool,
}

impl RepEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            conditioner: SignalConditioner::new(&config.filters),
            window: SlidingWindow::new(),
            machine: RepetitionStateMachine::new(config.repetition),
            scratch: [[0.0; CHANNELS]; WINDOW_SIZE],
            last_inference_ms: None,
            inference_active: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> RepState {
        self.machine.state()
    }

    pub fn counters(&self) -> &RepetitionCounters {
        self.machine.counters()
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn conditioner(&self) -> &SignalConditioner {
        &self.conditioner
    }

    pub fn machine(&self) -> &RepetitionStateMachine {
        &self.machine
    }

    /// Condition one raw sample and append it to the window.
    /// `None` means the sensor missed this period; nothing advances.
    /// A sample with a non-finite axis is dropped the same way, since it
    /// would stay in the filter delay terms for good.
    pub fn push_sample(&mut self, raw: Option<&RawSample>) -> Option<ProcessedSample> {
        let Some(raw) = raw else {
            log::trace!("missed sample, window not advanced");
            return None;
        };
        if !raw.is_finite() {
            log::warn!("non-finite sample dropped: {:?}", raw);
            return None;
        }
        let processed = self.conditioner.process(raw);
        self.window.push(processed);
        Some(processed)
    }

    /// Run a tick if inference is enabled and the interval has elapsed.
    pub fn poll<C: Classifier>(
        &mut self,
        now_ms: u32,
        switch: &InferenceSwitch,
        classifier: &mut C,
    ) -> Option<TickOutcome> {
        let enabled = switch.is_enabled();
        if enabled != self.inference_active {
            log::info!("inference {}", if enabled { "started" } else { "stopped" });
            self.inference_active = enabled;
            self.last_inference_ms = None;
        }
        if !enabled {
            return None;
        }

        let due = self
            .last_inference_ms
            .map_or(true, |last| now_ms.wrapping_sub(last) >= self.config.inference_interval_ms);
        if !due {
            return None;
        }
        self.last_inference_ms = Some(now_ms);
        Some(self.tick(now_ms, classifier))
    }

    /// Evaluate the current window right now.
    pub fn tick<C: Classifier>(&mut self, now_ms: u32, classifier: &mut C) -> TickOutcome {
        if !self
            .window
            .normalize_into(&self.config.normalization, &mut self.scratch)
        {
            return TickOutcome::WindowNotFull {
                samples: self.window.len(),
            };
        }

        let stats = WindowStats::from_samples(self.window.iter(), &self.config.phase);
        let phase = detect_phase(&stats, &self.config.phase);
        let verdict = classifier.classify(&self.scratch);
        if verdict.is_none() {
            log::warn!("no classifier verdict for this window");
        }

        let event = self.machine.update(phase, verdict, now_ms);
        log::debug!(
            "window: mean {:.3} g, std {:.3} g, rate {:.1} dps -> {:?} / {:?}, state {:?}",
            stats.vertical_mean,
            stats.vertical_std,
            stats.rotation_rate,
            phase,
            verdict.map(|v| v.class),
            self.machine.state()
        );

        TickOutcome::Evaluated {
            stats,
            phase,
            verdict,
            event,
        }
    }

    /// Forward any repetition event in `outcome` to the sink.
    pub fn publish<S: RepetitionSink>(&self, outcome: &TickOutcome, sink: &mut S) {
        match outcome.event() {
            Some(RepEvent::Completed(result)) => sink.repetition(result, self.counters()),
            Some(RepEvent::Abandoned { state, reason }) => sink.abandoned(*state, *reason),
            None => {}
        }
    }

    /// Drop the in-flight repetition immediately. Filters and window are kept.
    pub fn reset_cycle(&mut self) {
        self.machine.reset();
    }

    /// Full re-initialisation. Counters survive; use [`Self::reset_counters`] for those.
    pub fn reset(&mut self) {
        self.conditioner.reset();
        self.window.reset();
        self.machine.reset();
        self.last_inference_ms = None;
    }

    pub fn reset_counters(&mut self) {
        self.machine.reset_counters();
    }
}

impl Default for RepEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
