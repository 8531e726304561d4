//! Adapter exposing `embedded-hal` 0.2 blocking I2C as an `embedded-hal` 1.0 `I2c`.

use embedded_hal_02::blocking::i2c::{Read, Write};
use embedded_hal_1::i2c::{self, ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

/// Bus error reported by a 0.2 implementation.
#[derive(Debug)]
pub struct LegacyError<E>(pub E);

impl<E: core::fmt::Debug> i2c::Error for LegacyError<E> {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Wraps an `embedded-hal` 0.2 I2C peripheral.
pub struct Legacy<I> {
    device: I,
}

impl<I> Legacy<I> {
    pub fn new(device: I) -> Self {
        Legacy { device }
    }

    pub fn release(self) -> I {
        self.device
    }
}

impl<I, E> ErrorType for Legacy<I>
where
    I: Write<Error = E> + Read<Error = E>,
    E: core::fmt::Debug,
{
    type Error = LegacyError<E>;
}

impl<I, E> I2c<SevenBitAddress> for Legacy<I>
where
    I: Write<Error = E> + Read<Error = E>,
    E: core::fmt::Debug,
{
    // 0.2 has no repeated start, every operation becomes its own transfer
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Read(buf) => self.device.read(address, buf).map_err(LegacyError)?,
                Operation::Write(bytes) => self.device.write(address, bytes).map_err(LegacyError)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh0::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::eh0::MockError;

    #[test]
    fn forwards_write_and_read() {
        let expectations = [
            I2cTransaction::write(0x55, vec![0x74]),
            I2cTransaction::read(0x55, vec![0xF6]),
        ];
        let mut bus = Legacy::new(I2cMock::new(&expectations));

        bus.write(0x55, &[0x74]).unwrap();
        let mut buf = [0u8; 1];
        bus.read(0x55, &mut buf).unwrap();
        assert_eq!(buf, [0xF6]);

        bus.release().done();
    }

    #[test]
    fn wraps_bus_errors() {
        let expectations =
            [I2cTransaction::write(0x55, vec![0x74]).with_error(MockError::Io(std::io::ErrorKind::Other))];
        let mut bus = Legacy::new(I2cMock::new(&expectations));

        let err = bus.write(0x55, &[0x74]).unwrap_err();
        assert_eq!(i2c::Error::kind(&err), ErrorKind::Other);

        bus.release().done();
    }
}
