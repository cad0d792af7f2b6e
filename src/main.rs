// RepWatch: Entry Point
//
// On the ESP32-C3 this is the firmware:
//   1. Validate the pipeline configuration.
//   2. Bring up I2C and the IMU.
//   3. Spawn the button and serial tasks (flag only) and the sampling task
//      (everything else).
//
// On any other target it is the capture replay tool (see replay.rs).

#[cfg(target_os = "espidf")]
mod drivers;
#[cfg(target_os = "espidf")]
mod tasks;

#[cfg(not(target_os = "espidf"))]
mod replay;

#[cfg(target_os = "espidf")]
mod firmware {
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::gpio::{IOPin, PinDriver, Pull};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;

    use repwatch::config::*;
    use repwatch::ei::default_classifier;
    use repwatch::engine::{EngineConfig, InferenceSwitch, LogSink, RepEngine};

    use crate::drivers::imu::Icm20600;
    use crate::tasks;

    /// Written by the button and serial tasks, read by the sampling task.
    static INFERENCE: InferenceSwitch = InferenceSwitch::new(false);

    // -----------------------------------------------------------------------
    // Utility: milliseconds since boot (wraps at ~49 days, timeouts use wrapping math)
    // -----------------------------------------------------------------------
    pub fn now_ms() -> u32 {
        unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u32 }
    }

    pub fn run() -> anyhow::Result<()> {
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
        log::info!("RepWatch firmware starting…");

        let config = EngineConfig::default();
        config.validate()?;

        // ---- Peripherals --------------------------------------------------
        let peripherals = Peripherals::take()?;

        let mut button = PinDriver::input(peripherals.pins.gpio3.downgrade())?;
        button.set_pull(Pull::Up)?;

        let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_KHZ.kHz().into());
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio6, // SDA
            peripherals.pins.gpio7, // SCL
            &i2c_config,
        )?;

        let mut imu = Icm20600::new(i2c);
        if let Err(e) = imu.init() {
            // Keep running so the serial log stays available for debugging.
            log::error!("IMU init failed: {:#}", e);
        }

        // ---- Tasks (FreeRTOS tasks via std::thread) -----------------------
        thread::Builder::new()
            .name("button".into())
            .stack_size(STACK_BUTTON)
            .spawn(move || tasks::button::button_task(button, &INFERENCE))?;

        thread::Builder::new()
            .name("serial".into())
            .stack_size(STACK_SERIAL)
            .spawn(|| tasks::serial::serial_task(&INFERENCE))?;

        thread::Builder::new()
            .name("sampling".into())
            .stack_size(STACK_SAMPLING)
            .spawn(move || {
                tasks::sampling::sampling_task(
                    imu,
                    RepEngine::new(config),
                    &INFERENCE,
                    default_classifier(),
                    LogSink,
                );
            })?;

        log::info!("Boot complete, press the button or any key to start inference");

        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    replay::run()
}
