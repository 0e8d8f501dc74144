use static_assertions::const_assert;

//-----------------------------------------------------------------------------

pub const XTAL_FREQ: u32 = 8_000_000;
pub const SYSCLK_FREQ: u32 = 72_000_000;
pub const PCLK1_FREQ: u32 = 36_000_000;

//-----------------------------------------------------------------------------

pub const SYSTICK_RATE_HZ: u32 = 1_000;

//-----------------------------------------------------------------------------

// ADT7420, A0 = A1 = 1
pub const TEMP_SENSOR_ADDRESS: u8 = 0x4B;
pub const I2C_FREQ_KHZ: u32 = 100;

/// Sensor frame: temperature MSB, LSB
pub const SAMPLE_FRAME_LEN: usize = 2;

//-----------------------------------------------------------------------------

pub const CYCLE_PERIOD_MS: u64 = 1_000;
pub const ACQUISITION_TIMEOUT_MS: u64 = 50;

pub const MAX_CONSECUTIVE_FAILURES: u8 = 5;

//-----------------------------------------------------------------------------

pub const UART_BAUDRATE: u32 = 115_200;
pub const INBOUND_BUFFER_SIZE: usize = 500;

//-----------------------------------------------------------------------------

/// Raw code / HOST_SCALE = degrees Celsius
pub const HOST_SCALE: i32 = 128;

pub const DISPLAY_DIGITS: usize = 2;

//-----------------------------------------------------------------------------

const_assert!(SAMPLE_FRAME_LEN == 2);
const_assert!(ACQUISITION_TIMEOUT_MS < CYCLE_PERIOD_MS);
const_assert!(MAX_CONSECUTIVE_FAILURES > 0);
const_assert!(INBOUND_BUFFER_SIZE > 0);
const_assert!(DISPLAY_DIGITS >= 1 && DISPLAY_DIGITS <= 4);
const_assert!(TEMP_SENSOR_ADDRESS < 0x80);
