// RepWatch: Samples, Verdicts & Repetition Results

use crate::config::*;

// ---------------------------------------------------------------------------
// Raw sensor data (6-axis IMU reading)
// ---------------------------------------------------------------------------
/// One IMU reading in physical units: acceleration in g, angular rate in °/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    pub accel: [f32; ACCEL_CHANNELS],
    pub gyro: [f32; GYRO_CHANNELS],
}

impl RawSample {
    pub fn new(accel: [f32; ACCEL_CHANNELS], gyro: [f32; GYRO_CHANNELS]) -> Self {
        Self { accel, gyro }
    }

    /// False if any axis is NaN or infinite (bus glitch, corrupt capture).
    pub fn is_finite(&self) -> bool {
        self.accel.iter().chain(self.gyro.iter()).all(|v| v.is_finite())
    }

    /// Decode one little-endian capture frame: ax, ay, az, gx, gy, gz as f32.
    pub fn from_le_frame(frame: &[u8; RAW_FRAME_BYTES]) -> Self {
        let mut values = [0.0f32; CHANNELS];
        for (value, chunk) in values.iter_mut().zip(frame.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self {
            accel: [values[0], values[1], values[2]],
            gyro: [values[3], values[4], values[5]],
        }
    }
}

/// Size of one streamed capture frame (6 × f32).
pub const RAW_FRAME_BYTES: usize = CHANNELS * 4;

// ---------------------------------------------------------------------------
// Conditioned data
// ---------------------------------------------------------------------------
/// Gravity-compensated linear acceleration (g) followed by drift-free
/// angular rate (°/s): `[ax, ay, az, gx, gy, gz]`.
pub type ProcessedSample = [f32; CHANNELS];

// ---------------------------------------------------------------------------
// Posture classification
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostureClass {
    GoodForm,
    HipsHigh,
    HipsSagging,
    PartialRom,
}

impl PostureClass {
    /// Model output order.
    pub const ALL: [PostureClass; POSTURE_CLASS_COUNT] = [
        Self::GoodForm,
        Self::HipsHigh,
        Self::HipsSagging,
        Self::PartialRom,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Label string used by the training pipeline.
    pub fn label(self) -> &'static str {
        match self {
            Self::GoodForm => "good-form",
            Self::HipsHigh => "hips-high",
            Self::HipsSagging => "hips-sagging",
            Self::PartialRom => "partial-rom",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.label() == label)
    }
}

/// One classifier output, consumed at most once by the cycle tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierVerdict {
    pub class: PostureClass,
    /// Score of `class`, in [0, 1].
    pub confidence: f32,
}

impl ClassifierVerdict {
    pub fn new(class: PostureClass, confidence: f32) -> Self {
        Self {
            class,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Arg-max over per-class scores. Returns `None` if any score is NaN.
    pub fn from_scores(scores: &[f32; POSTURE_CLASS_COUNT]) -> Option<Self> {
        let mut best = 0;
        for (index, score) in scores.iter().enumerate() {
            if score.is_nan() {
                return None;
            }
            if *score > scores[best] {
                best = index;
            }
        }
        Some(Self::new(PostureClass::from_index(best)?, scores[best]))
    }
}

// ---------------------------------------------------------------------------
// Motion phase (output of the rule-based detector)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseLabel {
    AtTop,
    Moving,
    AtBottom,
}

// ---------------------------------------------------------------------------
// Repetition results
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Ascending phase returned to the top.
    Normal,
    /// Ascending phase exceeded its timeout; verdicts gathered so far were used.
    Forced,
}

/// One aggregated verdict per repetition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepetitionResult {
    /// `None` when no verdict was buffered during the cycle.
    pub class: Option<PostureClass>,
    pub confidence: f32,
    /// Number of verdicts that contributed.
    pub verdicts: usize,
    /// Fewer verdicts than the aggregator minimum; shown with a low-confidence flag.
    pub provisional: bool,
    pub completion: Completion,
}

/// Running totals, incremented once per [`RepetitionResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepetitionCounters {
    pub total: u32,
    pub per_class: [u32; POSTURE_CLASS_COUNT],
    pub unclassified: u32,
}

impl RepetitionCounters {
    pub fn record(&mut self, result: &RepetitionResult) {
        self.total += 1;
        match result.class {
            Some(class) => self.per_class[class.index()] += 1,
            None => self.unclassified += 1,
        }
    }

    pub fn count(&self, class: PostureClass) -> u32 {
        self.per_class[class.index()]
    }
}
