// RepWatch: Sliding Window Buffer
//
// Fixed-capacity ring of processed samples. The physical write index is an
// implementation detail; every read is in chronological order, oldest first.

use crate::config::*;
use crate::error::ConfigError;
use crate::events::ProcessedSample;

/// Classifier input: `W` rows of normalised channels, oldest first.
pub type NormalizedWindow<const W: usize = WINDOW_SIZE> = [[f32; CHANNELS]; W];

/// Per-channel standardisation, fixed at deployment from training data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; CHANNELS],
    pub std: [f32; CHANNELS],
}

impl Normalization {
    pub fn apply(&self, channel: usize, value: f32) -> f32 {
        (value - self.mean[channel]) / (self.std[channel] + NORMALIZATION_EPSILON)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.std.iter().position(|std| std.is_nan() || *std <= 0.0) {
            Some(channel) => Err(ConfigError::InvalidNormalization {
                channel,
                std: self.std[channel],
            }),
            None => Ok(()),
        }
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mean: NORM_MEAN,
            std: NORM_STD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlidingWindow<const W: usize = WINDOW_SIZE> {
    buffer: [ProcessedSample; W],
    write_index: usize,
    /// Samples written since the last reset, saturating at `W`.
    filled: usize,
}

impl<const W: usize> SlidingWindow<W> {
    pub const fn new() -> Self {
        Self {
            buffer: [[0.0; CHANNELS]; W],
            write_index: 0,
            filled: 0,
        }
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.filled = 0;
    }

    pub fn push(&mut self, sample: ProcessedSample) {
        self.buffer[self.write_index] = sample;
        self.write_index = (self.write_index + 1) % W;
        if self.filled < W {
            self.filled += 1;
        }
    }

    /// True once `W` samples have been pushed since the last reset.
    pub fn is_full(&self) -> bool {
        self.filled == W
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub const fn capacity(&self) -> usize {
        W
    }

    /// Stored samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessedSample> + '_ {
        // Before the ring wraps the oldest sample sits at 0; afterwards at the write index.
        let start = if self.is_full() { self.write_index } else { 0 };
        (0..self.filled).map(move |i| &self.buffer[(start + i) % W])
    }

    /// Materialise the window as classifier input. `None` until the window is warm.
    pub fn normalized_window(&self, norm: &Normalization) -> Option<NormalizedWindow<W>> {
        let mut out = [[0.0f32; CHANNELS]; W];
        self.normalize_into(norm, &mut out).then_some(out)
    }

    /// Like [`Self::normalized_window`] but writes into caller-owned storage.
    /// Returns `false` (leaving `out` untouched) if the window is not full.
    pub fn normalize_into(&self, norm: &Normalization, out: &mut NormalizedWindow<W>) -> bool {
        if !self.is_full() {
            return false;
        }
        for (row, sample) in out.iter_mut().zip(self.iter()) {
            for (channel, value) in row.iter_mut().enumerate() {
                *value = norm.apply(channel, sample[channel]);
            }
        }
        true
    }
}

impl<const W: usize> Default for SlidingWindow<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> ProcessedSample {
        let v = n as f32;
        [v, v + 0.1, v + 0.2, v * 10.0, -v, v * 0.5]
    }

    fn identity() -> Normalization {
        Normalization {
            mean: [0.0; CHANNELS],
            std: [1.0; CHANNELS],
        }
    }

    #[test]
    fn not_full_until_capacity_reached() {
        let mut window = SlidingWindow::<4>::new();
        for n in 0..3 {
            window.push(sample(n));
            assert!(!window.is_full());
            assert!(window.normalized_window(&identity()).is_none());
        }
        window.push(sample(3));
        assert!(window.is_full());
    }

    #[test]
    fn round_trip_preserves_chronological_order() {
        let mut window = SlidingWindow::<5>::new();
        for n in 0..5 {
            window.push(sample(n));
        }
        let out = window.normalized_window(&identity()).unwrap();
        for (n, row) in out.iter().enumerate() {
            for (got, want) in row.iter().zip(sample(n)) {
                assert!((got - want).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn order_is_independent_of_write_position() {
        let mut window = SlidingWindow::<5>::new();
        for n in 0..13 {
            window.push(sample(n));
        }
        let firsts: Vec<f32> = window.iter().map(|s| s[0]).collect();
        assert_eq!(firsts, vec![8.0, 9.0, 10.0, 11.0, 12.0]);

        let mut aligned = SlidingWindow::<5>::new();
        for n in 8..13 {
            aligned.push(sample(n));
        }
        let norm = Normalization::default();
        assert_eq!(window.normalized_window(&norm), aligned.normalized_window(&norm));
    }

    #[test]
    fn normalization_is_exact_per_channel() {
        let norm = Normalization {
            mean: [1.0, -1.0, 0.5, 2.0, 0.0, -3.0],
            std: [2.0, 0.5, 1.0, 4.0, 0.0, 10.0],
        };
        let mut window = SlidingWindow::<2>::new();
        window.push([3.0, 0.0, 0.5, 10.0, 1e-9, 7.0]);
        window.push([-1.0, -2.0, 1.5, 2.0, 0.0, -3.0]);
        let out = window.normalized_window(&norm).unwrap();
        for (row, sample) in out.iter().zip(window.iter()) {
            for (channel, (&got, &value)) in row.iter().zip(sample).enumerate() {
                let expected = (value - norm.mean[channel])
                    / (norm.std[channel] + NORMALIZATION_EPSILON);
                assert_eq!(got, expected);
            }
        }
        // Zero std stays finite thanks to epsilon.
        assert!(out[0][4].is_finite());
    }

    #[test]
    fn reset_empties_window() {
        let mut window = SlidingWindow::<3>::new();
        for n in 0..3 {
            window.push(sample(n));
        }
        window.reset();
        assert!(window.is_empty());
        assert!(!window.is_full());
        assert_eq!(window.iter().count(), 0);
    }

    #[test]
    fn default_normalization_is_valid() {
        assert!(Normalization::default().validate().is_ok());
        let mut norm = Normalization::default();
        norm.std[3] = 0.0;
        assert_eq!(
            norm.validate(),
            Err(ConfigError::InvalidNormalization { channel: 3, std: 0.0 })
        );
    }

    #[test]
    fn nan_std_is_rejected() {
        let mut norm = Normalization::default();
        norm.std[5] = f32::NAN;
        assert!(matches!(
            norm.validate(),
            Err(ConfigError::InvalidNormalization { channel: 5, .. })
        ));
    }
}
