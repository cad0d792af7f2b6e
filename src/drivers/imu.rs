// RepWatch: ICM-20600 IMU Driver
//
// Register-level driver; the register map is MPU-6050 compatible.
// Configured for ±2 g and ±250 °/s to match the training captures.

use anyhow::{bail, Context};
use esp_idf_hal::i2c::I2cDriver;

use repwatch::config::*;
use repwatch::events::RawSample;

const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B; // accel, temperature, gyro: 14 bytes
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I_ICM20600: u8 = 0x11;
const WHO_AM_I_MPU6050: u8 = 0x68;

const PWR_CLOCK_PLL: u8 = 0x01; // wake, auto-select PLL clock
const ACCEL_FS_2G: u8 = 0x00;
const GYRO_FS_250DPS: u8 = 0x00;

pub struct Icm20600 {
    bus: I2cDriver<'static>,
}

impl Icm20600 {
    pub fn new(bus: I2cDriver<'static>) -> Self {
        Self { bus }
    }

    pub fn who_am_i(&mut self) -> anyhow::Result<u8> {
        let mut buf = [0u8; 1];
        self.bus
            .write_read(I2C_ADDR_IMU, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS)
            .context("WHO_AM_I read failed")?;
        Ok(buf[0])
    }

    /// Wake the sensor and set the full-scale ranges.
    pub fn init(&mut self) -> anyhow::Result<()> {
        self.write_reg(REG_PWR_MGMT_1, PWR_CLOCK_PLL)?;
        std::thread::sleep(std::time::Duration::from_millis(50));
        self.write_reg(REG_ACCEL_CONFIG, ACCEL_FS_2G)?;
        self.write_reg(REG_GYRO_CONFIG, GYRO_FS_250DPS)?;
        std::thread::sleep(std::time::Duration::from_millis(10));

        let who = self.who_am_i()?;
        match who {
            WHO_AM_I_ICM20600 | WHO_AM_I_MPU6050 => {}
            other => bail!("unexpected WHO_AM_I 0x{:02X} at 0x{:02X}", other, I2C_ADDR_IMU),
        }

        log::info!("IMU initialised (WHO_AM_I=0x{:02X}, ±2g, ±250°/s)", who);
        Ok(())
    }

    /// Burst-read all 6 axes and convert to physical units.
    pub fn read_sample(&mut self) -> anyhow::Result<RawSample> {
        let mut raw = [0u8; 14];
        self.bus
            .write_read(I2C_ADDR_IMU, &[REG_ACCEL_XOUT_H], &mut raw, I2C_TIMEOUT_TICKS)?;

        let axis = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]) as f32;
        Ok(RawSample::new(
            [
                axis(0) / ACCEL_LSB_PER_G,
                axis(2) / ACCEL_LSB_PER_G,
                axis(4) / ACCEL_LSB_PER_G,
            ],
            // raw[6..8] = temperature, skipped
            [
                axis(8) / GYRO_LSB_PER_DPS,
                axis(10) / GYRO_LSB_PER_DPS,
                axis(12) / GYRO_LSB_PER_DPS,
            ],
        ))
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> anyhow::Result<()> {
        self.bus
            .write(I2C_ADDR_IMU, &[reg, value], I2C_TIMEOUT_TICKS)
            .with_context(|| format!("write to register 0x{:02X} failed", reg))
    }
}
