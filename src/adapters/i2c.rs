//! I²C bus adapter.
//!
//! Any `embedded-hal` 1.0 [`I2c`] master becomes a node [`Bus`].  The node
//! firmware answers from a fixed-size transmit buffer, so each transfer is
//! a single write-read of `read_len` bytes; the frame decoder ignores the
//! padding after the checksum.

use embedded_hal::i2c::I2c;

use crate::protocol::Bus;
use crate::protocol::codec::MAX_FRAME_LEN;

/// Bytes read per transfer unless configured otherwise.
pub const DEFAULT_READ_LEN: usize = 32;

pub struct I2cBus<I> {
    i2c: I,
    read_len: usize,
}

impl<I: I2c> I2cBus<I> {
    pub fn new(i2c: I) -> Self {
        Self::with_read_len(i2c, DEFAULT_READ_LEN)
    }

    /// `read_len` is clamped to the largest possible frame.
    pub fn with_read_len(i2c: I, read_len: usize) -> Self {
        Self {
            i2c,
            read_len: read_len.clamp(1, MAX_FRAME_LEN),
        }
    }

    pub fn read_len(&self) -> usize {
        self.read_len
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> Bus for I2cBus<I> {
    type Error = I::Error;

    fn transact(
        &mut self,
        address: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<usize, Self::Error> {
        let len = self.read_len.min(response.len());
        self.i2c.write_read(address, request, &mut response[..len])?;
        Ok(len)
    }
}
