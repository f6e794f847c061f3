//! Bus abstraction: any addressed request/response channel.
//!
//! Concrete implementations:
//! - I²C master via `embedded-hal` ([`crate::adapters::i2c::I2cBus`])
//! - Simulated node chain ([`crate::sim::VirtualChain`])
//!
//! The node client is generic over `Bus`, so adding a new transport
//! requires zero changes to the protocol logic.

/// Addressed, half-duplex request/response channel.
pub trait Bus {
    /// Error type for this bus.
    type Error: core::fmt::Debug;

    /// Write `request` to the device at `address`, then read its reply
    /// into `response`.  Returns the number of bytes placed in
    /// `response`; a fixed-length bus may always fill the whole buffer.
    fn transact(
        &mut self,
        address: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<usize, Self::Error>;
}

/// A bus with nothing attached: every transfer fails.
/// Useful as a placeholder before hardware is wired up.
pub struct NullBus;

impl Bus for NullBus {
    type Error = ();

    fn transact(&mut self, _address: u8, _request: &[u8], _response: &mut [u8]) -> Result<usize, ()> {
        Err(())
    }
}

impl<B: Bus + ?Sized> Bus for &mut B {
    type Error = B::Error;

    fn transact(
        &mut self,
        address: u8,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<usize, Self::Error> {
        (**self).transact(address, request, response)
    }
}
