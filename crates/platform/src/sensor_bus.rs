//! Register-addressed access to the IMU over SPI.
//!
//! Frame format (InvenSense MPU-6000/6500 family): the first byte carries the
//! register address with bit 7 set for reads; the second byte is the data
//! (written by the master on writes, clocked back by the sensor on reads).
//! Chip select framing comes from the [`SpiDevice`] implementation.

use embedded_hal::spi::SpiDevice;

use crate::error::SensorError;

/// Bit 7 of the address byte selects a read.
pub const READ_FLAG: u8 = 0x80;

/// Single-register read/write access to one SPI sensor.
pub struct RegisterBus<S> {
    spi: S,
}

impl<S: SpiDevice> RegisterBus<S> {
    /// Wrap an SPI device whose CS selects the sensor.
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Read one register.
    pub fn read_register(&mut self, address: u8) -> Result<u8, SensorError> {
        let mut frame = [READ_FLAG | address, 0x00];
        self.spi.transfer_in_place(&mut frame).map_err(|_| {
            #[cfg(feature = "defmt")]
            defmt::warn!("imu: read of {=u8:#x} failed", address);
            SensorError::Bus
        })?;
        let [_, value] = frame;
        Ok(value)
    }

    /// Write one register.
    pub fn write_register(&mut self, address: u8, value: u8) -> Result<(), SensorError> {
        self.spi
            .write(&[address & !READ_FLAG, value])
            .map_err(|_| {
                #[cfg(feature = "defmt")]
                defmt::warn!("imu: write of {=u8:#x} failed", address);
                SensorError::Bus
            })
    }

    /// Read the identity register and compare it to `expected`.
    pub fn probe(&mut self, who_am_i: u8, expected: u8) -> Result<(), SensorError> {
        let found = self.read_register(who_am_i)?;
        if found == expected {
            Ok(())
        } else {
            Err(SensorError::UnexpectedDevice { found, expected })
        }
    }

    /// Release the SPI device.
    pub fn release(self) -> S {
        self.spi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{ErrorKind, ErrorType, Operation};
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    #[test]
    fn read_sets_bit7_and_returns_second_byte() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0xF5, 0x00], vec![0x00, 0x70]),
            SpiTransaction::transaction_end(),
        ];
        let mut bus = RegisterBus::new(SpiMock::new(&expectations));
        assert_eq!(bus.read_register(0x75), Ok(0x70));
        bus.release().done();
    }

    #[test]
    fn write_clears_bit7() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x6B, 0x80]),
            SpiTransaction::transaction_end(),
        ];
        let mut bus = RegisterBus::new(SpiMock::new(&expectations));
        assert_eq!(bus.write_register(0xEB, 0x80), Ok(()));
        bus.release().done();
    }

    #[test]
    fn probe_reports_wrong_device() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0xF5, 0x00], vec![0x00, 0x68]),
            SpiTransaction::transaction_end(),
        ];
        let mut bus = RegisterBus::new(SpiMock::new(&expectations));
        assert_eq!(
            bus.probe(0x75, 0x70),
            Err(SensorError::UnexpectedDevice {
                found: 0x68,
                expected: 0x70
            })
        );
        bus.release().done();
    }

    struct DeadBus;

    impl ErrorType for DeadBus {
        type Error = ErrorKind;
    }

    impl SpiDevice for DeadBus {
        fn transaction(&mut self, _: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            Err(ErrorKind::ModeFault)
        }
    }

    #[test]
    fn bus_failure_surfaces_as_sensor_error() {
        let mut bus = RegisterBus::new(DeadBus);
        assert_eq!(bus.read_register(0x3B), Err(SensorError::Bus));
        assert_eq!(bus.write_register(0x6B, 0), Err(SensorError::Bus));
    }
}
