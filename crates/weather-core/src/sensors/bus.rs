//! Register-level bus abstraction
//!
//! The BME680 exposes the same register map over I2C and SPI. Drivers speak
//! [`RegisterBus`] and stay agnostic of the physical transport.

use embedded_hal_async::i2c::I2c;
use embedded_hal_async::spi::{Operation, SpiDevice};

/// Read and write device registers by address.
pub trait RegisterBus {
    type Error: core::fmt::Debug;

    /// Read `buf.len()` consecutive registers starting at `register`.
    fn read_registers(
        &mut self,
        register: u8,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn write_register(&mut self, register: u8, value: u8)
    -> impl Future<Output = Result<(), Self::Error>>;
}

/// I2C transport: register pointer write followed by a read.
pub struct I2cRegisterBus<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> I2cRegisterBus<I> {
    #[inline]
    pub const fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterBus for I2cRegisterBus<I> {
    type Error = I::Error;

    async fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &[register], buf).await
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[register, value]).await
    }
}

/// Status register holding the SPI memory page bit
const SPI_STATUS_REGISTER: u8 = 0x73;
const SPI_PAGE_BIT: u8 = 0x10;
const SPI_READ_BIT: u8 = 0x80;

/// SPI transport for the paged BME680 register map.
///
/// Only seven address bits go over the wire, so registers below `0x80` live
/// on page 1 and the rest on page 0. The page is switched lazily.
pub struct SpiRegisterBus<S> {
    spi: S,
    page: Option<u8>,
}

impl<S: SpiDevice> SpiRegisterBus<S> {
    #[inline]
    pub const fn new(spi: S) -> Self {
        Self { spi, page: None }
    }

    pub fn release(self) -> S {
        self.spi
    }

    async fn select_page(&mut self, register: u8) -> Result<(), S::Error> {
        if register == SPI_STATUS_REGISTER {
            return Ok(());
        }
        let page = if register < 0x80 { SPI_PAGE_BIT } else { 0x00 };
        if self.page != Some(page) {
            self.spi
                .write(&[SPI_STATUS_REGISTER & !SPI_READ_BIT, page])
                .await?;
            self.page = Some(page);
        }
        Ok(())
    }
}

impl<S: SpiDevice> RegisterBus for SpiRegisterBus<S> {
    type Error = S::Error;

    async fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.select_page(register).await?;
        self.spi
            .transaction(&mut [Operation::Write(&[register | SPI_READ_BIT]), Operation::Read(buf)])
            .await
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.select_page(register).await?;
        self.spi.write(&[register & !SPI_READ_BIT, value]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::{MockI2c, MockSpi};
    use embassy_futures::block_on;

    #[test]
    fn test_i2c_register_read_and_write() {
        let i2c = MockI2c::new().with_register(0x77, 0xD0, &[0x61]);
        let mut bus = I2cRegisterBus::new(i2c, 0x77);

        let mut id = [0u8; 1];
        block_on(bus.read_registers(0xD0, &mut id)).unwrap();
        block_on(bus.write_register(0xE0, 0xB6)).unwrap();

        assert_eq!(id, [0x61]);
        assert!(bus.release().wrote(0x77, &[0xE0, 0xB6]));
    }

    #[test]
    fn test_spi_selects_page_before_access() {
        let mut spi = MockSpi::default();
        spi.responses.insert(0xD0, alloc::vec![0x61]);
        spi.responses.insert(0x9D, alloc::vec![0x80]);
        let mut bus = SpiRegisterBus::new(spi);

        let mut id = [0u8; 1];
        block_on(bus.read_registers(0xD0, &mut id)).unwrap();
        assert_eq!(id, [0x61]);

        let mut status = [0u8; 1];
        block_on(bus.read_registers(0x1D, &mut status)).unwrap();
        assert_eq!(status, [0x80]);

        // Same page again, no extra page write
        block_on(bus.read_registers(0x1D, &mut status)).unwrap();

        let writes = bus.release().writes;
        assert_eq!(
            writes,
            alloc::vec![
                alloc::vec![0x73, 0x00],
                alloc::vec![0xD0],
                alloc::vec![0x73, 0x10],
                alloc::vec![0x9D],
                alloc::vec![0x9D],
            ]
        );
    }

    #[test]
    fn test_spi_write_clears_read_bit() {
        let mut bus = SpiRegisterBus::new(MockSpi::default());
        block_on(bus.write_register(0x74, 0x8D)).unwrap();

        let writes = bus.release().writes;
        assert_eq!(writes, alloc::vec![alloc::vec![0x73, 0x10], alloc::vec![0x74, 0x8D]]);
    }
}
