//! SPI3 master, blocking, 8-bit frames (RM0090 §28.5).
//!
//! The bus is enabled on first use: at construction time its clock gate may
//! still be closed. Chip select is handled by `embedded_hal_bus`'s
//! `ExclusiveDevice` around this bus.

use embassy_stm32::pac::spi::vals::{Br, Cpha, Cpol, Mstr};
use embassy_stm32::pac::spi::Spi;
use embedded_hal::spi::{Error, ErrorKind, ErrorType, SpiBus};

const SPI_MAX_POLLS: u32 = 10_000;

/// SPI3 bus failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiError {
    /// A status flag never came up within the poll budget.
    Timeout,
    /// MODF: another master drove NSS.
    ModeFault,
    /// OVR: a received byte was lost.
    Overrun,
}

impl Error for SpiError {
    fn kind(&self) -> ErrorKind {
        match self {
            SpiError::Timeout => ErrorKind::Other,
            SpiError::ModeFault => ErrorKind::ModeFault,
            SpiError::Overrun => ErrorKind::Overrun,
        }
    }
}

/// SPI3 in mode 3.
pub struct HardwareSpi {
    pub(crate) regs: Spi,
}

/// Status flag waited on by [`HardwareSpi::wait_for`].
#[derive(Clone, Copy)]
enum Flag {
    TxEmpty,
    RxNotEmpty,
}

impl HardwareSpi {
    fn ensure_enabled(&mut self) {
        if self.regs.cr1().read().spe() {
            return;
        }
        self.regs.cr1().write(|w| {
            w.set_cpha(Cpha::SECONDEDGE);
            w.set_cpol(Cpol::IDLEHIGH);
            w.set_mstr(Mstr::MASTER);
            // f_PCLK / 64: 656 kHz at APB1 = 42 MHz, inside the IMU's 1 MHz register limit.
            w.set_br(Br::DIV64);
            w.set_ssi(true);
            w.set_ssm(true);
        });
        self.regs.cr1().modify(|w| w.set_spe(true));
    }

    fn wait_for(&self, flag: Flag) -> Result<(), SpiError> {
        for _ in 0..SPI_MAX_POLLS {
            let sr = self.regs.sr().read();
            if sr.modf() {
                return Err(SpiError::ModeFault);
            }
            if sr.ovr() {
                // Reading DR then SR clears OVR.
                let _ = self.regs.dr().read();
                let _ = self.regs.sr().read();
                return Err(SpiError::Overrun);
            }
            let ready = match flag {
                Flag::TxEmpty => sr.txe(),
                Flag::RxNotEmpty => sr.rxne(),
            };
            if ready {
                return Ok(());
            }
        }
        Err(SpiError::Timeout)
    }

    fn exchange(&mut self, out: u8) -> Result<u8, SpiError> {
        self.wait_for(Flag::TxEmpty)?;
        self.regs.dr().write(|w| w.set_dr(u16::from(out)));
        self.wait_for(Flag::RxNotEmpty)?;
        let [low, _] = self.regs.dr().read().dr().to_le_bytes();
        Ok(low)
    }
}

impl ErrorType for HardwareSpi {
    type Error = SpiError;
}

impl SpiBus for HardwareSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), SpiError> {
        self.ensure_enabled();
        for word in words {
            *word = self.exchange(0x00)?;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), SpiError> {
        self.ensure_enabled();
        for &word in words {
            self.exchange(word)?;
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), SpiError> {
        self.ensure_enabled();
        let len = read.len().max(write.len());
        for i in 0..len {
            let out = write.get(i).copied().unwrap_or(0x00);
            let input = self.exchange(out)?;
            if let Some(slot) = read.get_mut(i) {
                *slot = input;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), SpiError> {
        self.ensure_enabled();
        for word in words {
            *word = self.exchange(*word)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SpiError> {
        for _ in 0..SPI_MAX_POLLS {
            if !self.regs.sr().read().bsy() {
                return Ok(());
            }
        }
        Err(SpiError::Timeout)
    }
}
