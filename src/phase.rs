// RepWatch: Rule-Based Phase Detector
//
// Stateless: the label is a pure function of the current window statistics.
// Rules are evaluated in order and the first match wins.

use crate::config::*;
use crate::error::ConfigError;
use crate::events::{PhaseLabel, ProcessedSample};

/// Summary of one window used for phase detection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Mean vertical acceleration (g), including the static vertical reference.
    pub vertical_mean: f32,
    /// Sample standard deviation of vertical acceleration (g).
    pub vertical_std: f32,
    /// Mean absolute rotation rate (°/s).
    pub rotation_rate: f32,
}

impl WindowStats {
    pub fn from_samples<'a, I>(samples: I, thresholds: &PhaseThresholds) -> Self
    where
        I: IntoIterator<Item = &'a ProcessedSample>,
    {
        // Welford keeps the variance stable in f32 for long windows.
        let mut count = 0u32;
        let mut mean = 0.0f32;
        let mut m2 = 0.0f32;
        let mut rate_sum = 0.0f32;

        for sample in samples {
            count += 1;
            let vertical = sample[thresholds.vertical_axis] + thresholds.vertical_reference;
            let delta = vertical - mean;
            mean += delta / count as f32;
            m2 += delta * (vertical - mean);
            rate_sum += sample[thresholds.rotation_axis].abs();
        }

        if count == 0 {
            return Self::default();
        }

        let variance = if count > 1 { m2 / (count - 1) as f32 } else { 0.0 };
        Self {
            vertical_mean: mean,
            vertical_std: variance.sqrt(),
            rotation_rate: rate_sum / count as f32,
        }
    }
}

/// Tuning constants for [`detect_phase`]. Accelerations in g, rates in °/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseThresholds {
    pub vertical_axis: usize,
    pub rotation_axis: usize,
    /// Static gravity on the vertical axis, added back to the linear signal.
    pub vertical_reference: f32,
    /// Rule 1: mean below this is a transition through the valley.
    pub low_mean: f32,
    /// Rule 2: mean above this is the bottom of the repetition.
    pub high_mean: f32,
    /// Rule 3: rotation above this is movement.
    pub active_rate: f32,
    /// Rules 4 and 6: plateau band of the top position.
    pub plateau_min: f32,
    pub plateau_max: f32,
    pub stable_std: f32,
    pub static_rate: f32,
    /// Rule 5: spread above this is movement.
    pub high_std: f32,
}

impl PhaseThresholds {
    pub fn in_plateau(&self, mean: f32) -> bool {
        (self.plateau_min..=self.plateau_max).contains(&mean)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vertical_axis >= CHANNELS || self.rotation_axis >= CHANNELS {
            return Err(ConfigError::InvertedThresholds("axis index out of range"));
        }
        if self.low_mean > self.high_mean {
            return Err(ConfigError::InvertedThresholds("low_mean > high_mean"));
        }
        if self.plateau_min > self.plateau_max {
            return Err(ConfigError::InvertedThresholds("plateau_min > plateau_max"));
        }
        if self.stable_std > self.high_std {
            return Err(ConfigError::InvertedThresholds("stable_std > high_std"));
        }
        if self.static_rate > self.active_rate {
            return Err(ConfigError::InvertedThresholds("static_rate > active_rate"));
        }
        Ok(())
    }
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            vertical_axis: VERTICAL_AXIS,
            rotation_axis: ROTATION_AXIS,
            vertical_reference: VERTICAL_REFERENCE_G,
            low_mean: PHASE_LOW_MEAN_G,
            high_mean: PHASE_HIGH_MEAN_G,
            active_rate: PHASE_ACTIVE_RATE_DPS,
            plateau_min: PHASE_PLATEAU_MIN_G,
            plateau_max: PHASE_PLATEAU_MAX_G,
            stable_std: PHASE_STABLE_STD_G,
            static_rate: PHASE_STATIC_RATE_DPS,
            high_std: PHASE_HIGH_STD_G,
        }
    }
}

pub fn detect_phase(stats: &WindowStats, t: &PhaseThresholds) -> PhaseLabel {
    let WindowStats {
        vertical_mean: mean,
        vertical_std: std,
        rotation_rate: rate,
    } = *stats;

    if mean < t.low_mean {
        PhaseLabel::Moving
    } else if mean > t.high_mean {
        PhaseLabel::AtBottom
    } else if rate > t.active_rate {
        PhaseLabel::Moving
    } else if t.in_plateau(mean) && std < t.stable_std && rate < t.static_rate {
        PhaseLabel::AtTop
    } else if std > t.high_std {
        PhaseLabel::Moving
    } else if t.in_plateau(mean) {
        PhaseLabel::AtTop
    } else {
        PhaseLabel::Moving
    }
}
