// RepWatch: Serial Console Task
//
// Any key typed on the USB serial console toggles inference, same as the
// button. Bytes already pending at boot (terminal handshakes, shell prompts)
// are discarded first.

use std::io::{ErrorKind, Read};
use std::thread;
use std::time::Duration;

use repwatch::config::*;
use repwatch::engine::InferenceSwitch;

pub fn serial_task(switch: &'static InferenceSwitch) {
    let poll = Duration::from_millis(SERIAL_POLL_INTERVAL_MS);
    let mut stdin = std::io::stdin();
    let mut buf = [0u8; 16];

    thread::sleep(Duration::from_millis(500));
    while matches!(stdin.read(&mut buf), Ok(n) if n > 0) {}
    log::info!("Serial task started, press any key to toggle inference");

    loop {
        match stdin.read(&mut buf) {
            Ok(n) if n > 0 => {
                if let Some(enabled) = switch.toggle_on_keys(&buf[..n]) {
                    log::info!(
                        "[INFERENCE {} via serial]",
                        if enabled { "STARTED" } else { "STOPPED" }
                    );
                }
            }
            Ok(_) => thread::sleep(poll),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                thread::sleep(poll)
            }
            Err(e) => {
                log::error!("serial console read failed, key toggle disabled: {}", e);
                return;
            }
        }
    }
}
