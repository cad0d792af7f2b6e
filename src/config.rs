// RepWatch: Hardware & Pipeline Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V) + ICM-20600 / MPU-6050 IMU
//
// Everything here is fixed at build time. The typed config structs in the
// pipeline modules take their `Default` values from these constants.

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_BUTTON: i32 = 3;      // D1/A1: inference start/stop (INPUT_PULLUP, active LOW)
pub const PIN_I2C_SDA: i32 = 6;     // D4: I2C data line
pub const PIN_I2C_SCL: i32 = 7;     // D5: I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_IMU: u8 = 0x69;       // ICM-20600 with AD0 high
pub const I2C_BAUDRATE_KHZ: u32 = 400;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// IMU Scale Factors (±2 g, ±250 °/s)
// ---------------------------------------------------------------------------
pub const ACCEL_LSB_PER_G: f32 = 16384.0;
pub const GYRO_LSB_PER_DPS: f32 = 131.0;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_SAMPLING: usize = 16384; // holds the normalized window during inference
pub const STACK_BUTTON: usize = 2048;
pub const STACK_SERIAL: usize = 3072;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const SAMPLE_PERIOD_MS: u32 = 25;          // 40 Hz, matches the filter design rate
pub const INFERENCE_INTERVAL_MS: u32 = 250;    // one window evaluation every 10 samples
pub const BUTTON_POLL_INTERVAL_MS: u64 = 10;
pub const SERIAL_POLL_INTERVAL_MS: u64 = 50;
pub const STATE_TIMEOUT_MS: u32 = 4_000;       // max dwell in Descending / AtBottom / Ascending
pub const CYCLE_TIMEOUT_MS: u32 = 10_000;      // max duration of one repetition

// ---------------------------------------------------------------------------
// Channels & Window
// ---------------------------------------------------------------------------
pub const ACCEL_CHANNELS: usize = 3;           // ax, ay, az
pub const GYRO_CHANNELS: usize = 3;            // gx, gy, gz
pub const CHANNELS: usize = ACCEL_CHANNELS + GYRO_CHANNELS;
pub const MEDIAN_KERNEL_SIZE: usize = 3;
pub const WINDOW_SIZE: usize = 50;             // 1.25 s @ 40 Hz
pub const NORMALIZATION_EPSILON: f32 = 1e-8;

/// Vertical axis of the wrist-mounted sensor in plank position.
pub const VERTICAL_AXIS: usize = 2;            // az
/// Gyro channel that carries the elbow flexion rate.
pub const ROTATION_AXIS: usize = ACCEL_CHANNELS + 1; // gy

// ---------------------------------------------------------------------------
// Posture Classifier
// ---------------------------------------------------------------------------
pub const POSTURE_CLASS_COUNT: usize = 4;
pub const CLASSIFIER_INPUT_SIZE: usize = WINDOW_SIZE * CHANNELS; // 300
pub const MIN_VERDICT_CONFIDENCE: f32 = 0.0;

/// Per-channel training statistics (ax, ay, az, gx, gy, gz).
pub const NORM_MEAN: [f32; CHANNELS] = [
    0.540_803_3,
    0.329_005_83,
    0.497_562_7,
    1.299_851_3,
    -0.616_117_6,
    0.024_165_002,
];
pub const NORM_STD: [f32; CHANNELS] = [
    0.439_144_3,
    0.351_463_8,
    0.254_288_7,
    28.788_408,
    21.548_819,
    22.036_606,
];

// ---------------------------------------------------------------------------
// Filter Coefficients (4th-order Butterworth @ 40 Hz, two sections each)
// Each section: [b0, b1, b2, a1, a2] with a0 normalised to 1.
// ---------------------------------------------------------------------------
/// Accelerometer low-pass, 10 Hz.
pub const ACCEL_LOWPASS_SOS: [[f32; 5]; 2] = [
    [0.259_891_54, 0.519_783_1, 0.259_891_54, 0.0, 0.039_566_13],
    [0.361_615_7, 0.723_231_4, 0.361_615_7, 0.0, 0.446_462_7],
];
/// Gyroscope high-pass, 0.2 Hz (bias drift removal).
pub const GYRO_HIGHPASS_SOS: [[f32; 5]; 2] = [
    [0.971_558_87, -1.943_117_7, 0.971_558_87, -1.942_638_3, 0.943_597_26],
    [0.987_878_6, -1.975_757_2, 0.987_878_6, -1.975_269_7, 0.976_244_8],
];
/// Gravity estimator low-pass, 0.5 Hz.
pub const GRAVITY_LOWPASS_SOS: [[f32; 5]; 2] = [
    [0.001_437_158_2, 0.002_874_316_4, 0.001_437_158_2, -1.859_076_3, 0.864_824_9],
    [0.001_496_403_6, 0.002_992_807_2, 0.001_496_403_6, -1.935_714_8, 0.941_700_5],
];

// ---------------------------------------------------------------------------
// Phase Detector Thresholds (absolute g / °/s)
// ---------------------------------------------------------------------------
pub const VERTICAL_REFERENCE_G: f32 = 1.0;     // static gravity on the vertical axis at the top
pub const PHASE_LOW_MEAN_G: f32 = 0.70;        // below: moving through the valley
pub const PHASE_HIGH_MEAN_G: f32 = 1.12;       // above: chest at the floor
pub const PHASE_PLATEAU_MIN_G: f32 = 0.72;
pub const PHASE_PLATEAU_MAX_G: f32 = 1.10;
pub const PHASE_STABLE_STD_G: f32 = 0.10;
pub const PHASE_HIGH_STD_G: f32 = 0.25;
pub const PHASE_ACTIVE_RATE_DPS: f32 = 20.0;
pub const PHASE_STATIC_RATE_DPS: f32 = 15.0;

// ---------------------------------------------------------------------------
// Repetition Segmentation
// ---------------------------------------------------------------------------
pub const CONFIRM_THRESHOLD: u8 = 2;           // consecutive windows before a transition
pub const CYCLE_TRACKER_CAPACITY: usize = 12;
pub const MIN_AGGREGATE_VERDICTS: usize = 2;
