//! In-memory buses for driver tests

use std::collections::BTreeMap;
use std::vec::Vec;

use embedded_hal::i2c::ErrorKind as I2cErrorKind;
use embedded_hal::spi::ErrorKind as SpiErrorKind;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, I2c};
use embedded_hal_async::spi::{self, SpiDevice};

/// I2C bus serving register reads from a map and recording every write.
///
/// A write followed by a read in one transaction is a register read keyed by
/// the first written byte. A bare read is served from the per-address queue.
#[derive(Debug, Default)]
pub struct MockI2c {
    pub registers: BTreeMap<(u8, u8), Vec<u8>>,
    pub plain_reads: BTreeMap<u8, Vec<u8>>,
    pub writes: Vec<(u8, Vec<u8>)>,
    pub fail: bool,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_register(mut self, address: u8, register: u8, data: &[u8]) -> Self {
        self.registers.insert((address, register), data.to_vec());
        self
    }

    pub fn with_plain_read(mut self, address: u8, data: &[u8]) -> Self {
        self.plain_reads.insert(address, data.to_vec());
        self
    }

    pub fn wrote(&self, address: u8, bytes: &[u8]) -> bool {
        self.writes
            .iter()
            .any(|(a, written)| *a == address && written.as_slice() == bytes)
    }
}

fn fill(buf: &mut [u8], data: Option<&Vec<u8>>) {
    buf.fill(0);
    if let Some(data) = data {
        let len = buf.len().min(data.len());
        buf[..len].copy_from_slice(&data[..len]);
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = I2cErrorKind;
}

impl I2c for MockI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(I2cErrorKind::Other);
        }

        let mut register = None;
        for op in operations.iter_mut() {
            match op {
                i2c::Operation::Write(bytes) => {
                    register = bytes.first().copied();
                    self.writes.push((address, bytes.to_vec()));
                }
                i2c::Operation::Read(buf) => match register {
                    Some(reg) => fill(buf, self.registers.get(&(address, reg))),
                    None => fill(buf, self.plain_reads.get(&address)),
                },
            }
        }
        Ok(())
    }
}

/// SPI device recording every transaction and answering reads from a map
/// keyed by the command byte.
#[derive(Debug, Default)]
pub struct MockSpi {
    pub responses: BTreeMap<u8, Vec<u8>>,
    pub writes: Vec<Vec<u8>>,
}

impl spi::ErrorType for MockSpi {
    type Error = SpiErrorKind;
}

impl SpiDevice for MockSpi {
    async fn transaction(
        &mut self,
        operations: &mut [spi::Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        let mut command = None;
        for op in operations.iter_mut() {
            match op {
                spi::Operation::Write(bytes) => {
                    command = bytes.first().copied();
                    self.writes.push(bytes.to_vec());
                }
                spi::Operation::Read(buf) => {
                    fill(buf, command.and_then(|c| self.responses.get(&c)));
                }
                _ => return Err(SpiErrorKind::Other),
            }
        }
        Ok(())
    }
}

/// Delay that returns immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}
