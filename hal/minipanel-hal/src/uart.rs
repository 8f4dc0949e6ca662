//! UART serial communication abstractions
//!
//! The simulator link is polled from the main loop, so reads never block:
//! a receiver hands out whatever bytes have already arrived.

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Queue data for transmission
    ///
    /// Blocks only while the transmit buffer is full.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
pub trait UartRx {
    /// Read up to `buf.len()` bytes that are already available
    ///
    /// Returns 0 when nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> usize;

    /// Take one pending byte, if any
    fn try_read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.read_available(&mut buf) {
            0 => None,
            _ => Some(buf[0]),
        }
    }
}

/// Combined UART interface
///
/// For links that provide both TX and RX on a single peripheral.
pub trait Uart: UartTx + UartRx {}

// Blanket implementation
impl<T: UartTx + UartRx> Uart for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Script {
        bytes: &'static [u8],
        pos: usize,
    }

    impl UartRx for Script {
        fn read_available(&mut self, buf: &mut [u8]) -> usize {
            let n = buf.len().min(self.bytes.len() - self.pos);
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            n
        }
    }

    #[test]
    fn test_try_read_byte_drains_then_none() {
        let mut rx = Script { bytes: b"@1", pos: 0 };
        assert_eq!(rx.try_read_byte(), Some(b'@'));
        assert_eq!(rx.try_read_byte(), Some(b'1'));
        assert_eq!(rx.try_read_byte(), None);
    }

    struct Loopback {
        last: Option<u8>,
    }

    impl UartTx for Loopback {
        type Error = ();

        fn write_blocking(&mut self, data: &[u8]) -> Result<(), ()> {
            self.last = data.last().copied();
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ()> {
            Ok(())
        }
    }

    impl UartRx for Loopback {
        fn read_available(&mut self, buf: &mut [u8]) -> usize {
            match (self.last.take(), buf.first_mut()) {
                (Some(b), Some(slot)) => {
                    *slot = b;
                    1
                }
                _ => 0,
            }
        }
    }

    fn echo<P: crate::Uart>(port: &mut P, byte: u8) -> Option<u8> {
        port.write_blocking(&[byte]).ok()?;
        port.try_read_byte()
    }

    #[test]
    fn test_combined_uart_from_crate_root() {
        let mut port = Loopback { last: None };
        assert_eq!(echo(&mut port, b'$'), Some(b'$'));
        assert_eq!(port.try_read_byte(), None);
    }
}
