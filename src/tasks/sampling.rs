// RepWatch: Sampling Task
//
// The only thread that touches pipeline state. Reads one IMU sample per
// period (40 Hz), pushes it through the engine and polls inference at its
// own cadence. The button task only flips the shared switch.

use std::thread;
use std::time::{Duration, Instant};

use repwatch::config::*;
use repwatch::ei::Classifier;
use repwatch::engine::{InferenceSwitch, RepEngine, RepetitionSink};

use crate::drivers::imu::Icm20600;
use crate::firmware::now_ms;

pub fn sampling_task<C: Classifier, S: RepetitionSink>(
    mut imu: Icm20600,
    mut engine: RepEngine,
    switch: &'static InferenceSwitch,
    mut classifier: C,
    mut sink: S,
) {
    log::info!("Sampling task started");

    let period = Duration::from_millis(SAMPLE_PERIOD_MS as u64);
    let mut was_enabled = switch.is_enabled();

    loop {
        let tick_start = Instant::now();

        let sample = match imu.read_sample() {
            Ok(sample) => Some(sample),
            Err(e) => {
                log::warn!("IMU read error: {}", e);
                None
            }
        };
        engine.push_sample(sample.as_ref());

        // Stopping inference drops whatever repetition was in flight.
        let enabled = switch.is_enabled();
        if was_enabled && !enabled {
            engine.reset_cycle();
        }
        was_enabled = enabled;

        if let Some(outcome) = engine.poll(now_ms(), switch, &mut classifier) {
            engine.publish(&outcome, &mut sink);
        }

        let elapsed = tick_start.elapsed();
        if elapsed < period {
            thread::sleep(period - elapsed);
        } else {
            log::debug!("sampling overran its period by {:?}", elapsed - period);
        }
    }
}
