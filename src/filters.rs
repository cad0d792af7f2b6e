// RepWatch: Filter Primitives
//
// Stateful single-channel building blocks. No heap, no knowledge of what
// the channel measures.

use crate::config::*;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Rolling median
// ---------------------------------------------------------------------------

/// Rolling median over the last `N` values. Rejects single-sample spikes
/// (I2C glitches) without the phase lag of a linear filter.
#[derive(Debug, Clone, Copy)]
pub struct RollingMedian<const N: usize> {
    ring: [f32; N],
    index: usize,
    primed: bool,
}

impl<const N: usize> RollingMedian<N> {
    pub const fn new() -> Self {
        Self {
            ring: [0.0; N],
            index: 0,
            primed: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn apply(&mut self, value: f32) -> f32 {
        // The first value fills the whole ring so start-up does not see zeros.
        if !self.primed {
            self.ring = [value; N];
            self.primed = true;
        }
        self.ring[self.index] = value;
        self.index = (self.index + 1) % N;

        let mut sorted = self.ring;
        // Insertion sort; N is tiny.
        for i in 1..N {
            let mut j = i;
            while j > 0 && sorted[j - 1] > sorted[j] {
                sorted.swap(j - 1, j);
                j -= 1;
            }
        }
        sorted[N / 2]
    }
}

impl<const N: usize> Default for RollingMedian<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// 3-tap median used on every IMU axis.
pub type Median3 = RollingMedian<MEDIAN_KERNEL_SIZE>;

// ---------------------------------------------------------------------------
// Biquad (Direct Form II transposed)
// ---------------------------------------------------------------------------

/// Normalised second-order section coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoefficients {
    /// From `[b0, b1, b2, a1, a2]`.
    pub const fn from_array(c: [f32; 5]) -> Self {
        Self {
            b0: c[0],
            b1: c[1],
            b2: c[2],
            a1: c[3],
            a2: c[4],
        }
    }

    /// Largest pole magnitude of `z² + a1·z + a2`. Stable iff `< 1`.
    pub fn pole_magnitude(&self) -> f32 {
        let disc = self.a1 * self.a1 - 4.0 * self.a2;
        if disc < 0.0 {
            // Complex conjugate pair: |p|² = a2
            self.a2.sqrt()
        } else {
            let root = disc.sqrt();
            let p1 = (-self.a1 + root) / 2.0;
            let p2 = (-self.a1 - root) / 2.0;
            p1.abs().max(p2.abs())
        }
    }
}

/// One biquad section with its two persisted delay terms.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    w1: f32,
    w2: f32,
}

impl Biquad {
    pub const fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            w1: 0.0,
            w2: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.w1 = 0.0;
        self.w2 = 0.0;
    }

    #[inline]
    pub fn apply(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.w1;
        self.w1 = c.b1 * input - c.a1 * output + self.w2;
        self.w2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// Two cascaded biquads: one 4th-order Butterworth stage.
#[derive(Debug, Clone, Copy)]
pub struct Cascade4 {
    sections: [Biquad; 2],
}

impl Cascade4 {
    pub const fn new(sos: [BiquadCoefficients; 2]) -> Self {
        Self {
            sections: [Biquad::new(sos[0]), Biquad::new(sos[1])],
        }
    }

    pub fn reset(&mut self) {
        self.sections.iter_mut().for_each(Biquad::reset);
    }

    #[inline]
    pub fn apply(&mut self, input: f32) -> f32 {
        let intermediate = self.sections[0].apply(input);
        self.sections[1].apply(intermediate)
    }
}

// ---------------------------------------------------------------------------
// Deployment coefficient set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRole {
    AccelLowpass,
    GyroHighpass,
    GravityLowpass,
}

/// Precomputed section coefficients for the three filter roles.
/// Designed offline for the deployment sample rate; never recomputed here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCoefficients {
    pub accel_lowpass: [BiquadCoefficients; 2],
    pub gyro_highpass: [BiquadCoefficients; 2],
    pub gravity_lowpass: [BiquadCoefficients; 2],
}

impl FilterCoefficients {
    pub fn role(&self, role: FilterRole) -> &[BiquadCoefficients; 2] {
        match role {
            FilterRole::AccelLowpass => &self.accel_lowpass,
            FilterRole::GyroHighpass => &self.gyro_highpass,
            FilterRole::GravityLowpass => &self.gravity_lowpass,
        }
    }

    /// Offline check: every section must have all poles inside the unit circle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for role in [
            FilterRole::AccelLowpass,
            FilterRole::GyroHighpass,
            FilterRole::GravityLowpass,
        ] {
            for (section, coeffs) in self.role(role).iter().enumerate() {
                let pole_magnitude = coeffs.pole_magnitude();
                if pole_magnitude.is_nan() || pole_magnitude >= 1.0 {
                    return Err(ConfigError::UnstableFilter {
                        role,
                        section,
                        pole_magnitude,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for FilterCoefficients {
    fn default() -> Self {
        let sos = |c: [[f32; 5]; 2]| {
            [
                BiquadCoefficients::from_array(c[0]),
                BiquadCoefficients::from_array(c[1]),
            ]
        };
        Self {
            accel_lowpass: sos(ACCEL_LOWPASS_SOS),
            gyro_highpass: sos(GYRO_HIGHPASS_SOS),
            gravity_lowpass: sos(GRAVITY_LOWPASS_SOS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_rejects_single_spike() {
        let mut median = Median3::new();
        let out: Vec<f32> = [1.0, 1.0, 9.0, 1.0, 1.0]
            .iter()
            .map(|v| median.apply(*v))
            .collect();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn median_first_sample_passes_through() {
        let mut median = Median3::new();
        assert_eq!(median.apply(0.98), 0.98);
    }

    #[test]
    fn median_tracks_step_after_two_samples() {
        let mut median = Median3::new();
        median.apply(0.0);
        assert_eq!(median.apply(5.0), 0.0);
        assert_eq!(median.apply(5.0), 5.0);
    }

    #[test]
    fn biquad_impulse_response_matches_difference_equation() {
        let c = BiquadCoefficients::from_array([0.5, 0.25, 0.125, -0.5, 0.25]);
        let mut bq = Biquad::new(c);
        // y0 = b0
        assert!((bq.apply(1.0) - 0.5).abs() < 1e-7);
        // y1 = b1 - a1*y0 = 0.25 + 0.25
        assert!((bq.apply(0.0) - 0.5).abs() < 1e-7);
        // y2 = b2 - a1*y1 - a2*y0 = 0.125 + 0.25 - 0.125
        assert!((bq.apply(0.0) - 0.25).abs() < 1e-7);
    }

    #[test]
    fn reset_clears_delay_terms() {
        let mut cascade = Cascade4::new(FilterCoefficients::default().gravity_lowpass);
        for _ in 0..100 {
            cascade.apply(1.0);
        }
        cascade.reset();
        let mut fresh = Cascade4::new(FilterCoefficients::default().gravity_lowpass);
        assert_eq!(cascade.apply(0.7), fresh.apply(0.7));
    }

    #[test]
    fn default_coefficients_are_stable() {
        assert_eq!(FilterCoefficients::default().validate(), Ok(()));
    }

    /// Steady-state gain of one section for a constant input.
    fn dc_gain(c: &BiquadCoefficients) -> f32 {
        (c.b0 + c.b1 + c.b2) / (1.0 + c.a1 + c.a2)
    }

    #[test]
    fn lowpass_sections_have_unity_dc_gain() {
        let coeffs = FilterCoefficients::default();
        for section in coeffs.accel_lowpass.iter().chain(&coeffs.gravity_lowpass) {
            assert!((dc_gain(section) - 1.0).abs() < 1e-3, "{section:?}");
        }
        for section in &coeffs.gyro_highpass {
            assert!(dc_gain(section).abs() < 1e-3, "{section:?}");
        }
    }

    #[test]
    fn unstable_section_is_reported() {
        let mut coeffs = FilterCoefficients::default();
        coeffs.gyro_highpass[1].a2 = 1.05;
        match coeffs.validate() {
            Err(ConfigError::UnstableFilter { role, section, .. }) => {
                assert_eq!(role, FilterRole::GyroHighpass);
                assert_eq!(section, 1);
            }
            other => panic!("expected unstable filter, got {other:?}"),
        }
    }

    #[test]
    fn nan_coefficient_is_reported_unstable() {
        let mut coeffs = FilterCoefficients::default();
        coeffs.accel_lowpass[0].a1 = f32::NAN;
        assert!(matches!(
            coeffs.validate(),
            Err(ConfigError::UnstableFilter { role: FilterRole::AccelLowpass, section: 0, .. })
        ));
    }

    #[test]
    fn real_poles_outside_unit_circle_detected() {
        // z² - 2.5z + 1 = (z - 2)(z - 0.5)
        let c = BiquadCoefficients::from_array([1.0, 0.0, 0.0, -2.5, 1.0]);
        assert!((c.pole_magnitude() - 2.0).abs() < 1e-6);
    }
}
