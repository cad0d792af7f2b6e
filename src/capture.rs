// RepWatch: Capture Replay
//
// Runs a recorded stream of raw IMU frames through the full pipeline on a
// simulated clock (frame index × sample period). The capture format is what
// the data-collection firmware streams: back-to-back little-endian frames of
// ax, ay, az, gx, gy, gz as f32.

use crate::config::*;
use crate::ei::Classifier;
use crate::engine::{InferenceSwitch, RepEngine, RepetitionSink, TickOutcome};
use crate::events::{RawSample, RepetitionCounters, RAW_FRAME_BYTES};
use crate::repetition::RepEvent;

/// Decoded frames plus the length of any trailing partial frame.
pub fn decode_frames(bytes: &[u8]) -> (impl Iterator<Item = RawSample> + '_, usize) {
    let chunks = bytes.chunks_exact(RAW_FRAME_BYTES);
    let trailing = chunks.remainder().len();
    let frames = chunks.filter_map(|chunk| {
        <&[u8; RAW_FRAME_BYTES]>::try_from(chunk)
            .ok()
            .map(RawSample::from_le_frame)
    });
    (frames, trailing)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub windows_evaluated: usize,
    pub abandoned: usize,
    pub trailing_bytes: usize,
    pub counters: RepetitionCounters,
}

/// Feed every frame of `bytes` into `engine` with inference enabled.
pub fn replay<C: Classifier, S: RepetitionSink>(
    bytes: &[u8],
    engine: &mut RepEngine,
    classifier: &mut C,
    sink: &mut S,
) -> ReplaySummary {
    let switch = InferenceSwitch::new(true);
    let (frames, trailing_bytes) = decode_frames(bytes);
    let mut summary = ReplaySummary {
        trailing_bytes,
        ..ReplaySummary::default()
    };

    for (index, sample) in frames.enumerate() {
        let now_ms = (index as u32).wrapping_mul(SAMPLE_PERIOD_MS);
        engine.push_sample(Some(&sample));
        summary.frames += 1;

        let Some(outcome) = engine.poll(now_ms, &switch, classifier) else {
            continue;
        };
        if let TickOutcome::Evaluated { event, .. } = outcome {
            summary.windows_evaluated += 1;
            if let Some(RepEvent::Abandoned { .. }) = event {
                summary.abandoned += 1;
            }
        }
        engine.publish(&outcome, sink);
    }

    if trailing_bytes > 0 {
        log::warn!("ignoring {} trailing bytes (partial frame)", trailing_bytes);
    }
    summary.counters = *engine.counters();
    summary
}
