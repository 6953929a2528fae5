//! Where transmitted bytes go.

use std::io::Write;

use log::warn;

/// Receives bytes written by the guest. Delivery cannot fail from the
/// device's point of view.
pub trait SerialSink {
    fn write_bytes(&mut self, buf: &[u8]);
}

impl<F: FnMut(&[u8])> SerialSink for F {
    fn write_bytes(&mut self, buf: &[u8]) {
        (self)(buf)
    }
}

/// Forwards to an `io::Write`, flushing after every slice so a terminal
/// sees output as it is transmitted.
pub struct WriteSink<W: Write> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> SerialSink for WriteSink<W> {
    fn write_bytes(&mut self, buf: &[u8]) {
        if let Err(e) = self.inner.write_all(buf).and_then(|_| self.inner.flush()) {
            warn!("serial output dropped {} byte(s): {e}", buf.len());
        }
    }
}
