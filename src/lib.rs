// RepWatch: push-up repetition counter and form classifier
//
// Pipeline, one sample at a time:
//
//   IMU ─▶ conditioner ─▶ window ─┬─▶ classifier ──┐
//                                 └─▶ phase rules ─┴─▶ state machine ─▶ sink
//
// Everything in this crate runs on the host as well as on the ESP32-C3;
// only the binary touches hardware.

pub mod aggregator;
pub mod capture;
pub mod conditioner;
pub mod config;
pub mod ei;
pub mod engine;
pub mod error;
pub mod events;
pub mod filters;
pub mod phase;
pub mod repetition;
pub mod window;

pub use aggregator::{aggregate, Aggregation, AggregationPolicy};
pub use capture::{decode_frames, replay, ReplaySummary};
pub use conditioner::SignalConditioner;
pub use ei::{default_classifier, Classifier, StubClassifier};
pub use engine::{EngineConfig, InferenceSwitch, LogSink, RepEngine, RepetitionSink, TickOutcome};
pub use error::ConfigError;
pub use events::{
    ClassifierVerdict, Completion, PhaseLabel, PostureClass, RawSample, RepetitionCounters,
    RepetitionResult,
};
pub use phase::{detect_phase, PhaseThresholds, WindowStats};
pub use repetition::{AbandonReason, RepEvent, RepState, RepetitionConfig, RepetitionStateMachine};
pub use window::{Normalization, SlidingWindow};
