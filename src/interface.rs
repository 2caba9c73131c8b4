/// Hardware capabilities a node needs from its host: the serial peripheral,
/// a millisecond clock and a CRC-16 implementation.
pub trait Interface {
    /// Read one byte from the peripheral, `None` if nothing is available.
    /// Called from the receive interrupt context.
    fn rx_byte(&self) -> Option<u8>;
    /// Push one byte to the peripheral, blocking until the peripheral
    /// accepts it or the per-byte timeout elapses. Returns `false` on
    /// timeout or transmit error.
    fn tx_byte(&self, byte: u8) -> bool;
    /// Free-running millisecond clock.
    fn millis(&self) -> u32;
    /// CRC-16 over `data`: polynomial 0x8005, initial value 0, no
    /// reflection. Override to use a hardware CRC unit.
    fn calculate_crc(&self, data: &[u8]) -> u16 {
        crate::crc::crc16(data)
    }
}
