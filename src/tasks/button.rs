// RepWatch: Button Task
//
// Toggles inference on each press (active LOW, pull-up). Touches nothing but
// the shared switch; the sampling task acts on it.

use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyIOPin, Input, PinDriver};

use repwatch::config::*;
use repwatch::engine::InferenceSwitch;

pub fn button_task(pin: PinDriver<'static, AnyIOPin, Input>, switch: &'static InferenceSwitch) {
    log::info!("Button task started, press to start inference");

    let poll = Duration::from_millis(BUTTON_POLL_INTERVAL_MS);
    let mut was_pressed = false;

    loop {
        let pressed = pin.is_low();
        if pressed && !was_pressed {
            let enabled = switch.toggle();
            log::info!("[INFERENCE {}]", if enabled { "STARTED" } else { "STOPPED" });
        }
        was_pressed = pressed;
        thread::sleep(poll);
    }
}
