const CRC_POLYNOMIAL: u16 = 0x8005;

/// Incremental CRC-16 with polynomial 0x8005, initial value 0, no input or
/// output reflection and no final XOR. The value transmitted on the wire is
/// `finalize()` of the raw payload; a message followed by its own big-endian
/// CRC always checks to zero.
pub struct Crc16Context {
    crc: u16,
}

impl Crc16Context {
    pub fn new() -> Self {
        Crc16Context { crc: 0 }
    }

    pub fn step(&mut self, byte: u8) {
        self.crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if self.crc & 0x8000 != 0 {
                self.crc = (self.crc << 1) ^ CRC_POLYNOMIAL;
            } else {
                self.crc <<= 1;
            }
        }
    }

    pub fn finalize(&self) -> u16 {
        self.crc
    }
}

/// One-shot CRC-16 over a byte slice.
pub fn crc16(data: &[u8]) -> u16 {
    let mut context = Crc16Context::new();
    for &byte in data {
        context.step(byte);
    }
    context.finalize()
}
