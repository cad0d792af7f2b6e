// RepWatch: Posture Classifier Interface
//
// The trained model lives outside this crate. The pipeline only needs
// "given a normalised window, return per-class scores".
//
// Back-ends:
//   1. STUB (default): a window-energy heuristic so the whole pipeline runs
//      on the host and on hardware without the C++ inference SDK.
//   2. FFI: enable the `edge-impulse` feature; build.rs compiles the exported
//      SDK and `EiClassifier` calls it. Quantisation happens inside the SDK.

use crate::config::*;
use crate::events::ClassifierVerdict;
use crate::window::NormalizedWindow;

// ---------------------------------------------------------------------------
// Public interface
// ---------------------------------------------------------------------------

pub trait Classifier {
    /// Per-class scores in model output order, or `None` if inference failed
    /// or missed its deadline.
    fn scores(&mut self, window: &NormalizedWindow) -> Option<[f32; POSTURE_CLASS_COUNT]>;

    fn classify(&mut self, window: &NormalizedWindow) -> Option<ClassifierVerdict> {
        let scores = self.scores(window)?;
        ClassifierVerdict::from_scores(&scores)
    }
}

// ---------------------------------------------------------------------------
// Stub back-end: development / testing without the C++ SDK
// ---------------------------------------------------------------------------

/// Guesses posture from how far the window strays from the training mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubClassifier;

impl Classifier for StubClassifier {
    fn scores(&mut self, window: &NormalizedWindow) -> Option<[f32; POSTURE_CLASS_COUNT]> {
        let n = window.len() as f32;
        let mean_abs = window.iter().flatten().map(|v| v.abs()).sum::<f32>() / (n * CHANNELS as f32);
        let vertical_bias = window.iter().map(|row| row[VERTICAL_AXIS]).sum::<f32>() / n;

        let scores = if mean_abs < 0.5 {
            [0.05, 0.05, 0.05, 0.85] // barely moved: partial range of motion
        } else if vertical_bias > 1.0 {
            [0.10, 0.05, 0.80, 0.05] // sagging hips load the vertical axis
        } else if vertical_bias < -1.0 {
            [0.10, 0.80, 0.05, 0.05]
        } else {
            [0.88, 0.04, 0.04, 0.04]
        };

        log::debug!(
            "STUB inference: mean |x| = {:.2}, vertical bias = {:.2}, scores = {:?}",
            mean_abs,
            vertical_bias,
            scores
        );
        Some(scores)
    }
}

// ---------------------------------------------------------------------------
// Real FFI back-end: calls the compiled C++ inference library
// ---------------------------------------------------------------------------
#[cfg(feature = "edge-impulse")]
mod ffi {
    use std::ffi::c_char;

    #[repr(C)]
    pub struct EiSignal {
        pub get_data: Option<unsafe extern "C" fn(usize, usize, *mut f32) -> i32>,
        pub total_length: usize,
    }

    #[repr(C)]
    pub struct EiClassification {
        pub label: *const c_char,
        pub value: f32,
    }

    // The full struct has more fields; we only access `classification`.
    #[repr(C)]
    pub struct EiImpulseResult {
        pub classification: [EiClassification; super::POSTURE_CLASS_COUNT],
        pub anomaly: f32,
    }

    extern "C" {
        pub fn run_classifier(
            signal: *mut EiSignal,
            result: *mut EiImpulseResult,
            debug: bool,
        ) -> i32;
    }
}

/// Classifier backed by the linked C++ SDK.
#[cfg(feature = "edge-impulse")]
#[derive(Debug, Default)]
pub struct EiClassifier;

#[cfg(feature = "edge-impulse")]
impl Classifier for EiClassifier {
    fn scores(&mut self, window: &NormalizedWindow) -> Option<[f32; POSTURE_CLASS_COUNT]> {
        use std::ffi::CStr;

        use crate::events::PostureClass;

        // Signal callback reads directly from the window.
        // SAFETY: single control flow; only the sampling loop calls this.
        static mut SIGNAL_BUF: *const f32 = std::ptr::null();
        static mut SIGNAL_LEN: usize = 0;

        unsafe extern "C" fn get_data(offset: usize, length: usize, out: *mut f32) -> i32 {
            unsafe {
                if SIGNAL_BUF.is_null() || offset + length > SIGNAL_LEN {
                    return -1;
                }
                core::ptr::copy_nonoverlapping(SIGNAL_BUF.add(offset), out, length);
            }
            0
        }

        unsafe {
            // Rows are contiguous: [[f32; CHANNELS]; WINDOW_SIZE] is CLASSIFIER_INPUT_SIZE floats.
            SIGNAL_BUF = window.as_ptr() as *const f32;
            SIGNAL_LEN = CLASSIFIER_INPUT_SIZE;

            let mut signal = ffi::EiSignal {
                get_data: Some(get_data),
                total_length: CLASSIFIER_INPUT_SIZE,
            };

            let mut result: ffi::EiImpulseResult = core::mem::zeroed();

            let err = ffi::run_classifier(&mut signal, &mut result, false);
            SIGNAL_BUF = std::ptr::null();
            if err != 0 {
                log::error!("posture classifier error: {}", err);
                return None;
            }

            // Scores are placed by label, so a model exported with a
            // different class order still lands on the right class.
            let mut preds = [0.0f32; POSTURE_CLASS_COUNT];
            for entry in &result.classification {
                let label = CStr::from_ptr(entry.label).to_str().unwrap_or("?");
                log::debug!("{}: {:.4}", label, entry.value);
                match PostureClass::from_label(label) {
                    Some(class) => preds[class.index()] = entry.value,
                    None => {
                        log::error!("posture classifier returned unknown label '{}'", label);
                        return None;
                    }
                }
            }
            Some(preds)
        }
    }
}

/// The classifier compiled into this build.
#[cfg(not(feature = "edge-impulse"))]
pub fn default_classifier() -> StubClassifier {
    StubClassifier
}

#[cfg(feature = "edge-impulse")]
pub fn default_classifier() -> EiClassifier {
    EiClassifier
}
