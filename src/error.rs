// RepWatch: Configuration Errors
//
// The pipeline itself never fails at runtime. These errors describe
// deployment constants that must be rejected before flashing.

use thiserror::Error;

use crate::filters::FilterRole;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{role:?} section {section} is unstable (pole magnitude {pole_magnitude:.6} >= 1)")]
    UnstableFilter {
        role: FilterRole,
        section: usize,
        pole_magnitude: f32,
    },

    #[error("window size must be non-zero")]
    EmptyWindow,

    #[error("normalization std for channel {channel} must be positive, got {std}")]
    InvalidNormalization { channel: usize, std: f32 },

    #[error("confirm threshold must be at least 2, got {0}")]
    ConfirmThresholdTooLow(u8),

    #[error("cycle tracker capacity must be non-zero")]
    EmptyCycleTracker,

    #[error("cycle timeout ({cycle_ms} ms) is shorter than the state timeout ({state_ms} ms)")]
    TimeoutOrder { state_ms: u32, cycle_ms: u32 },

    #[error("inference interval must be non-zero")]
    ZeroInferenceInterval,

    #[error("phase threshold band is inverted: {0}")]
    InvertedThresholds(&'static str),
}
