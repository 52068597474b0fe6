//! PMBus register map and LINEAR11 decoding
//!
//! PSU telemetry words are read through the BMC with `i2cget ... w` and come
//! back as raw 16-bit LINEAR11 values.

/// PMBus telemetry registers read from the PSUs
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmbusRegister {
    /// Input voltage, volts (0x88)
    ReadVin = 0x88,
    /// Input current, amps (0x89)
    ReadIin = 0x89,
    /// Output current, amps (0x8C)
    ReadIout = 0x8c,
    /// Output power, watts (0x96)
    ReadPout = 0x96,
}

impl PmbusRegister {
    /// Register address as sent to `i2cget`
    pub fn addr(self) -> u8 {
        self as u8
    }
}

/// Decode a PMBus LINEAR11 word to a value in base SI units (V, A, W)
///
/// Bits [15:11] hold a 5-bit two's complement exponent `N`, bits [10:0] an
/// 11-bit two's complement mantissa `Y`. The value is `Y * 2^N`.
///
/// ```
/// use wedgebmc_core::pmbus::decode_linear11;
///
/// // N = -2, Y = 1000 -> 250.0
/// assert_eq!(decode_linear11(0xF3E8), 250.0);
/// ```
pub fn decode_linear11(raw: u16) -> f64 {
    let exp_raw = ((raw >> 11) & 0x1f) as i32;
    let exponent = if exp_raw < 16 { exp_raw } else { exp_raw - 32 };

    let man_raw = (raw & 0x7ff) as i64;
    let mantissa = if man_raw < 1024 {
        man_raw
    } else {
        man_raw - 2048
    };

    if exponent >= 0 {
        (mantissa << exponent) as f64
    } else {
        mantissa as f64 / (1u64 << (-exponent)) as f64
    }
}
