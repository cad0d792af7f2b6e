// RepWatch: Channel Filter Bank & Signal Conditioner
//
// Per sample, per axis:
//   accel: median -> 10 Hz low-pass -> (0.5 Hz gravity low-pass) -> subtract gravity
//   gyro:  median -> 0.2 Hz high-pass
//
// Called exactly once per raw sample, in arrival order.

use crate::config::*;
use crate::events::{ProcessedSample, RawSample};
use crate::filters::{Cascade4, FilterCoefficients, Median3};

// ---------------------------------------------------------------------------
// Channel filter bank
// ---------------------------------------------------------------------------

/// Filter state for one accelerometer axis.
#[derive(Debug, Clone, Copy)]
struct AccelChannel {
    median: Median3,
    lowpass: Cascade4,
    gravity: Cascade4,
}

/// Output of one accelerometer axis.
#[derive(Debug, Clone, Copy)]
struct AccelOutput {
    linear: f32,
    gravity: f32,
}

impl AccelChannel {
    fn new(coeffs: &FilterCoefficients) -> Self {
        Self {
            median: Median3::new(),
            lowpass: Cascade4::new(coeffs.accel_lowpass),
            gravity: Cascade4::new(coeffs.gravity_lowpass),
        }
    }

    fn apply(&mut self, raw: f32) -> AccelOutput {
        let denoised = self.median.apply(raw);
        let shaped = self.lowpass.apply(denoised);
        // Gravity is tracked on the band-shaped signal, not the raw one.
        let gravity = self.gravity.apply(shaped);
        AccelOutput {
            linear: shaped - gravity,
            gravity,
        }
    }

    fn reset(&mut self) {
        self.median.reset();
        self.lowpass.reset();
        self.gravity.reset();
    }
}

/// Filter state for one gyroscope axis.
#[derive(Debug, Clone, Copy)]
struct GyroChannel {
    median: Median3,
    highpass: Cascade4,
}

impl GyroChannel {
    fn new(coeffs: &FilterCoefficients) -> Self {
        Self {
            median: Median3::new(),
            highpass: Cascade4::new(coeffs.gyro_highpass),
        }
    }

    fn apply(&mut self, raw: f32) -> f32 {
        self.highpass.apply(self.median.apply(raw))
    }

    fn reset(&mut self) {
        self.median.reset();
        self.highpass.reset();
    }
}

/// Per-axis cascades for all six IMU channels.
#[derive(Debug, Clone, Copy)]
pub struct ChannelFilterBank {
    accel: [AccelChannel; ACCEL_CHANNELS],
    gyro: [GyroChannel; GYRO_CHANNELS],
}

impl ChannelFilterBank {
    pub fn new(coeffs: &FilterCoefficients) -> Self {
        Self {
            accel: [AccelChannel::new(coeffs); ACCEL_CHANNELS],
            gyro: [GyroChannel::new(coeffs); GYRO_CHANNELS],
        }
    }

    pub fn reset(&mut self) {
        self.accel.iter_mut().for_each(AccelChannel::reset);
        self.gyro.iter_mut().for_each(GyroChannel::reset);
    }
}

// ---------------------------------------------------------------------------
// Signal conditioner
// ---------------------------------------------------------------------------

/// Turns raw IMU samples into gravity-compensated, drift-free features.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    bank: ChannelFilterBank,
    gravity: [f32; ACCEL_CHANNELS],
    samples: u32,
}

impl SignalConditioner {
    pub fn new(coeffs: &FilterCoefficients) -> Self {
        Self {
            bank: ChannelFilterBank::new(coeffs),
            gravity: [0.0; ACCEL_CHANNELS],
            samples: 0,
        }
    }

    /// Clear all filter state. Coefficients are kept.
    pub fn reset(&mut self) {
        self.bank.reset();
        self.gravity = [0.0; ACCEL_CHANNELS];
        self.samples = 0;
    }

    pub fn process(&mut self, raw: &RawSample) -> ProcessedSample {
        let mut out = [0.0f32; CHANNELS];

        for (axis, channel) in self.bank.accel.iter_mut().enumerate() {
            let AccelOutput { linear, gravity } = channel.apply(raw.accel[axis]);
            out[axis] = linear;
            self.gravity[axis] = gravity;
        }
        for (axis, channel) in self.bank.gyro.iter_mut().enumerate() {
            out[ACCEL_CHANNELS + axis] = channel.apply(raw.gyro[axis]);
        }

        self.samples = self.samples.saturating_add(1);
        log::trace!("conditioned sample {}: {:?}", self.samples, out);
        out
    }

    /// Most recent gravity estimate (g) per accelerometer axis.
    pub fn gravity(&self) -> [f32; ACCEL_CHANNELS] {
        self.gravity
    }

    /// Samples processed since construction or the last reset.
    pub fn samples_processed(&self) -> u32 {
        self.samples
    }
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::new(&FilterCoefficients::default())
    }
}
