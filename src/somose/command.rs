//! SOMOSE command set and response decoding.
//!
//! Every transfer is a single command byte, optionally followed by payload
//! bytes, then a fixed-length response after the settle delay.

/// 16 bit moisture minimum, dry reference (read).
pub const CMD_GET_REFERENCE_DRY: u8 = 0x64;
/// 16 bit moisture maximum, wet reference (read).
pub const CMD_GET_REFERENCE_WET: u8 = 0x75;
pub const CMD_SET_REFERENCE_DRY: u8 = 0x44;
pub const CMD_SET_REFERENCE_WET: u8 = 0x55;
pub const CMD_SET_I2C_ADDRESS: u8 = 0x41;
pub const CMD_TEMPERATURE: u8 = 0x74;
/// Dump byte followed by the averaged 8 bit moisture value.
pub const CMD_MOISTURE_AVERAGED: u8 = 0x76;
/// Big-endian 16 bit raw moisture value, same as ASCII `'r'`.
pub const CMD_MOISTURE_RAW: u8 = 0x72;
pub const CMD_HARDWARE_VERSION: u8 = b'h';
pub const CMD_FIRMWARE_VERSION: u8 = b'f';
pub const CMD_STATUS: u8 = b'o';
pub const CMD_LOW_POWER: u8 = b'L';
pub const CMD_START_MEASUREMENT: u8 = b'M';

pub const STATUS_MEASURING: u8 = 0x01;
pub const STATUS_LOW_POWER: u8 = 0x02;

/// Bits expected in the status byte before the register reset can be skipped.
pub const STATUS_RESET_MASK: u8 = 0x18;
pub const RESET_REGISTERS: [u8; 3] = [0x1B, 0x1C, 0x1E];

/// Raw count corresponding to 100 % moisture.
pub const MOISTURE_FULL_SCALE: f32 = 8000.0;

#[inline]
pub fn be_u16(buf: [u8; 2]) -> u16 {
    u16::from_be_bytes(buf)
}

/// Reference writes go out low byte first, unlike the big-endian reads.
#[inline]
pub fn le_payload(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// 7 bit address shifted into the 8 bit address field, R/W bit cleared.
#[inline]
pub fn address_payload(address: u8) -> u8 {
    (address << 1) & 0xFE
}

/// Averaged moisture response, byte 0 is a dump byte.
#[inline]
pub fn averaged_moisture(buf: [u8; 2]) -> u8 {
    buf[1]
}

pub fn moisture_percent(raw: u16) -> f32 {
    raw as f32 * 100.0 / MOISTURE_FULL_SCALE
}

/// Which temperature encoding the device revision uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TemperatureFormat {
    /// Two's complement, -128..127 °C
    #[default]
    Signed,
    /// Legacy unsigned byte, 0..255 °C
    Unsigned,
}

impl TemperatureFormat {
    pub fn decode(self, byte: u8) -> f32 {
        match self {
            TemperatureFormat::Signed => byte as i8 as f32,
            TemperatureFormat::Unsigned => byte as f32,
        }
    }
}

/// `major.minor` as reported by the `'h'` and `'f'` commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const HARDWARE_FALLBACK: Version = Version { major: 2, minor: 2 };
    pub const FIRMWARE_FALLBACK: Version = Version { major: 1, minor: 2 };

    /// Parses `v<major>.<minor>`, one ASCII digit each.
    pub fn parse(buf: [u8; 4]) -> Option<Self> {
        if buf[0] != b'v' || buf[2] != b'.' {
            return None;
        }
        if !buf[1].is_ascii_digit() || !buf[3].is_ascii_digit() {
            return None;
        }
        Some(Version {
            major: buf[1] - b'0',
            minor: buf[3] - b'0',
        })
    }
}

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_reads() {
        for (b0, b1) in [(0x00, 0x64), (0x03, 0x84), (0xFF, 0xFF), (0x12, 0x00)] {
            assert_eq!(be_u16([b0, b1]), b0 as u16 * 256 + b1 as u16);
        }
    }

    #[test]
    fn little_endian_payloads() {
        for v in [0u16, 1, 0x00FF, 0x0100, 0x1F40, 0xABCD, u16::MAX] {
            assert_eq!(le_payload(v), [(v & 0xFF) as u8, ((v >> 8) & 0xFF) as u8]);
        }
    }

    #[test]
    fn address_payload_clears_lsb() {
        for addr in 0u8..128 {
            assert_eq!(address_payload(addr), (addr << 1) & 0xFE);
            assert_eq!(address_payload(addr) & 0x01, 0);
        }
        assert_eq!(address_payload(0x55), 0xAA);
    }

    #[test]
    fn moisture_percent_is_not_clamped() {
        assert_eq!(moisture_percent(0), 0.0);
        assert_eq!(moisture_percent(4000), 50.0);
        assert_eq!(moisture_percent(8000), 100.0);
        assert_eq!(moisture_percent(1234), 1234.0 * 100.0 / 8000.0);
        assert_eq!(moisture_percent(9600), 120.0);
    }

    #[test]
    fn averaged_moisture_skips_dump_byte() {
        assert_eq!(averaged_moisture([0x00, 0x32]), 50);
        assert_eq!(averaged_moisture([0xAA, 0x32]), 50);
    }

    #[test]
    fn temperature_formats() {
        assert_eq!(TemperatureFormat::Signed.decode(0xF6), -10.0);
        assert_eq!(TemperatureFormat::Signed.decode(0x7F), 127.0);
        assert_eq!(TemperatureFormat::Signed.decode(0x80), -128.0);
        assert_eq!(TemperatureFormat::Unsigned.decode(0xF6), 246.0);
        assert_eq!(TemperatureFormat::Unsigned.decode(0x15), 21.0);
    }

    #[test]
    fn version_parsing() {
        assert_eq!(Version::parse(*b"v2.3"), Some(Version { major: 2, minor: 3 }));
        assert_eq!(Version::parse(*b"x2.3"), None);
        assert_eq!(Version::parse(*b"v2,3"), None);
        assert_eq!(Version::parse(*b"vx.3"), None);
        assert_eq!(Version::parse(*b"v2.x"), None);
        assert_eq!(Version { major: 1, minor: 2 }.to_string(), "1.2");
    }
}
